//! Rumor cycle phases.
//!
//! A main-loop pass moves `Idle -> Chirping -> Listening/Propagating ->
//! Idle`. What happens when a listen window closes depends only on the
//! reason being served, whether anyone still misses the rumor and how many
//! propagation attempts were made, so that decision is a pure function.

use super::reason::RumorReason;
use super::state::PROPAGATION_COUNT_LIMIT;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    /// Offering to receive, `attempt` chirps sent so far this pass.
    Chirping { attempt: u8 },
    /// Spreading our own rumor.
    Listening { reason: RumorReason },
    /// Looking for a node to take the rumor over.
    Propagating { attempts: u8 },
}

impl Phase {
    /// Phase for serving `reason` in a listen window.
    pub fn listen(reason: RumorReason, propagation_count: u8) -> Self {
        if reason == RumorReason::PropagateRumor {
            Self::Propagating {
                attempts: propagation_count,
            }
        } else {
            Self::Listening { reason }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Chirping { .. } => "chirping",
            Self::Listening { .. } => "listening",
            Self::Propagating { .. } => "propagating",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chirping { attempt } => write!(f, "chirping({})", attempt),
            Self::Listening { reason } => write!(f, "listening({})", reason),
            Self::Propagating { attempts } => write!(f, "propagating({})", attempts),
            Self::Idle => f.write_str("idle"),
        }
    }
}

/// What to do when a listen window runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOutcome {
    /// A neighbour probe finished. Nothing to report.
    ProbeDone,
    /// Every target heard the rumor.
    Retire,
    /// Some targets missed it. Ask neighbours to take it over.
    StartPropagation,
    /// Nobody took it over this time. Try again on a later pass.
    RetryPropagation,
    /// Propagation attempts exhausted.
    Abandon,
}

impl WindowOutcome {
    /// Whether the initiator should be told how the rumor went.
    pub fn confirms(self) -> bool {
        matches!(self, Self::Retire | Self::Abandon)
    }
}

/// Decide the outcome of a closed listen window.
///
/// `attempts` counts propagation windows including the one that just
/// closed.
pub fn window_closed(current: RumorReason, rumor_pending: bool, attempts: u8) -> WindowOutcome {
    match current {
        RumorReason::PropagateRumor if attempts < PROPAGATION_COUNT_LIMIT => {
            WindowOutcome::RetryPropagation
        }
        RumorReason::PropagateRumor => WindowOutcome::Abandon,
        r if r.is_probe() => WindowOutcome::ProbeDone,
        _ if rumor_pending => WindowOutcome::StartPropagation,
        _ => WindowOutcome::Retire,
    }
}
