//! WiSafe-2 mesh protocol.
//!
//! This module contains:
//! - [`state`]: Protocol state of one gateway
//! - [`reason`]: Rumor reasons and their service order
//! - [`fsm`]: Rumor cycle phases and listen-window outcomes
//! - [`link`]: Timed radio exchanges (join, chirp, listen, acks)
//! - [`engine`]: The main-loop pass
//! - [`random`]: Listen jitter generator
//!
//! Host command handling and continuous-wave calibration extend
//! [`MeshEngine`] from their own files.

mod calibration;
mod commands;
pub mod engine;
pub mod fsm;
pub mod link;
pub mod random;
pub mod reason;
pub mod state;

pub use engine::{EngineError, MeshEngine, CMD_LEARN, CMD_UNLEARN, ON_BOARD_BUTTON};
pub use fsm::{Phase, WindowOutcome};
pub use link::{JoinAck, RadioLink, ReceivedRumor};
pub use random::Lfsr;
pub use reason::{Reasons, RumorReason};
pub use state::{LearnState, MeshState, OutgoingMsg, PendingConfirmation, Targets};
