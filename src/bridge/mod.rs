//! Host bridge.
//!
//! This module contains:
//! - [`escape`]: FLAG/ESC stream framing with a streaming decoder
//! - [`command`]: Classification of decoded messages into [`HostCommand`]s
//! - [`link`]: Bounded queues between the host and the mesh task

pub mod command;
pub mod escape;
pub mod link;

pub use command::{extended, spimsg, HostCommand, Rejected, Tune};
pub use escape::{encode, Decoder, HostMessage, ESC, FLAG, MAX_MESSAGE_LEN};
pub use link::{host_link, HostLink, LinkError, MeshPort, QueueItem, QUEUE_ITEM_SIZE};
