//! Reasons for starting a rumor.
//!
//! Several reasons can be pending at once. Each main-loop pass services the
//! highest-priority one; the rest stay queued in [`Reasons`].

use std::fmt;

/// Why the gateway wants to spread a rumor.
///
/// The discriminants are the bit values reported to the host in the
/// `D4 1A` extended response, so they must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RumorReason {
    SdRumor = 0x0008,
    CheckNbrs = 0x0010,
    Joined = 0x0020,
    StatusReply = 0x0040,
    StatusRequest = 0x0080,
    PropagateRumor = 0x0100,
    SpreadRumor = 0x0200,
    MapReply = 0x0800,
    MapRequest = 0x1000,
    SidMapUpdate = 0x2000,
    SniffNbrs = 0x4000,
}

/// Service order, highest first.
///
/// A rumor already in the buffer (propagate, then spread) always wins over
/// building a new one.
pub const PRIORITY: [RumorReason; 11] = [
    RumorReason::PropagateRumor,
    RumorReason::SpreadRumor,
    RumorReason::StatusReply,
    RumorReason::StatusRequest,
    RumorReason::MapReply,
    RumorReason::MapRequest,
    RumorReason::SdRumor,
    RumorReason::CheckNbrs,
    RumorReason::SniffNbrs,
    RumorReason::Joined,
    RumorReason::SidMapUpdate,
];

impl RumorReason {
    pub const fn bit(self) -> u16 {
        self as u16
    }

    /// Neighbour probes: the rumor has no real audience and never
    /// propagates.
    pub fn is_probe(self) -> bool {
        matches!(self, Self::CheckNbrs | Self::SniffNbrs)
    }

    /// Reasons that reuse the rumor already in the buffer.
    pub fn reuses_buffer(self) -> bool {
        matches!(self, Self::PropagateRumor | Self::SpreadRumor)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::SdRumor => "sd_rumor",
            Self::CheckNbrs => "check_nbrs",
            Self::Joined => "joined",
            Self::StatusReply => "status_reply",
            Self::StatusRequest => "status_request",
            Self::PropagateRumor => "propagate",
            Self::SpreadRumor => "spread",
            Self::MapReply => "map_reply",
            Self::MapRequest => "map_request",
            Self::SidMapUpdate => "sidmap_update",
            Self::SniffNbrs => "sniff_nbrs",
        }
    }
}

impl fmt::Display for RumorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of pending reasons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reasons(u16);

impl Reasons {
    pub const NONE: Reasons = Reasons(0);

    pub fn insert(&mut self, reason: RumorReason) {
        self.0 |= reason.bit();
    }

    pub fn remove(&mut self, reason: RumorReason) {
        self.0 &= !reason.bit();
    }

    pub fn contains(&self, reason: RumorReason) -> bool {
        self.0 & reason.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Raw bitmask as reported to the host.
    pub fn bits(&self) -> u16 {
        self.0
    }

    /// The reason the next rumor should be built for.
    pub fn highest_priority(&self) -> Option<RumorReason> {
        PRIORITY.iter().copied().find(|r| self.contains(*r))
    }

    /// Pending reasons in service order.
    pub fn iter(&self) -> impl Iterator<Item = RumorReason> + '_ {
        PRIORITY.iter().copied().filter(move |r| self.contains(*r))
    }
}

impl fmt::Display for Reasons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for r in self.iter() {
            if !first {
                f.write_str(",")?;
            }
            f.write_str(r.name())?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wisafe_rs_esp32_macros::esp32_test;

    #[esp32_test]
    fn test_priority_order() {
        let mut reasons = Reasons::NONE;
        reasons.insert(RumorReason::SidMapUpdate);
        reasons.insert(RumorReason::Joined);
        assert_eq!(reasons.highest_priority(), Some(RumorReason::Joined));

        reasons.insert(RumorReason::CheckNbrs);
        assert_eq!(reasons.highest_priority(), Some(RumorReason::CheckNbrs));

        reasons.insert(RumorReason::SdRumor);
        reasons.insert(RumorReason::StatusReply);
        assert_eq!(reasons.highest_priority(), Some(RumorReason::StatusReply));

        reasons.insert(RumorReason::SpreadRumor);
        assert_eq!(reasons.highest_priority(), Some(RumorReason::SpreadRumor));

        reasons.insert(RumorReason::PropagateRumor);
        assert_eq!(reasons.highest_priority(), Some(RumorReason::PropagateRumor));
    }

    #[esp32_test]
    fn test_priority_table_covers_every_reason() {
        let mut seen = 0u16;
        for r in PRIORITY {
            assert_eq!(seen & r.bit(), 0, "{} listed twice", r);
            seen |= r.bit();
        }
        assert_eq!(seen, 0x7BF8);
    }

    #[esp32_test]
    fn test_insert_remove() {
        let mut reasons = Reasons::default();
        assert!(reasons.is_empty());
        reasons.insert(RumorReason::MapRequest);
        reasons.insert(RumorReason::SdRumor);
        assert_eq!(reasons.bits(), 0x1008);
        reasons.remove(RumorReason::MapRequest);
        assert!(!reasons.contains(RumorReason::MapRequest));
        assert_eq!(reasons.to_string(), "sd_rumor");
        reasons.clear();
        assert_eq!(reasons.highest_priority(), None);
    }

    #[esp32_test]
    fn test_reason_kinds() {
        assert!(RumorReason::SniffNbrs.is_probe());
        assert!(!RumorReason::Joined.is_probe());
        assert!(RumorReason::SpreadRumor.reuses_buffer());
        assert!(!RumorReason::SdRumor.reuses_buffer());
    }
}
