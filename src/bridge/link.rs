//! Bounded queues between the host and the mesh task.
//!
//! Items are 16 raw bytes of escaped stream. A message longer than one item
//! after escaping is split over several; the receiving [`Decoder`] keeps
//! state between items. Enqueueing never waits: a full queue drops the
//! message and logs it.

use super::escape::{encode, Decoder, HostMessage, FLAG};
use log::error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

/// Size of one queue item.
pub const QUEUE_ITEM_SIZE: usize = 16;

/// One queue item.
pub type QueueItem = [u8; QUEUE_ITEM_SIZE];

/// Items the longest reply can take once escaped: 13 bytes, each possibly
/// doubled, plus the closing FLAG.
pub const MAX_REPLY_ITEMS: usize = 2;

/// Queue errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// The queue is full; the message was dropped.
    Full,
    /// The other side has gone away.
    Closed,
}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkError::Full => write!(f, "host queue full"),
            LinkError::Closed => write!(f, "host queue closed"),
        }
    }
}

impl std::error::Error for LinkError {}

/// Split an encoded stream into queue items. The last item is padded with
/// FLAG, which the decoder stops at.
fn items(encoded: &[u8]) -> Vec<QueueItem> {
    encoded
        .chunks(QUEUE_ITEM_SIZE)
        .map(|chunk| {
            let mut item = [FLAG; QUEUE_ITEM_SIZE];
            item[..chunk.len()].copy_from_slice(chunk);
            item
        })
        .collect()
}

fn send_items(tx: &mpsc::Sender<QueueItem>, payload: &[u8]) -> Result<(), LinkError> {
    let encoded = encode(payload);
    let items = items(&encoded);
    if tx.capacity() < items.len() {
        return Err(LinkError::Full);
    }
    for item in items {
        tx.try_send(item).map_err(|e| match e {
            TrySendError::Full(_) => LinkError::Full,
            TrySendError::Closed(_) => LinkError::Closed,
        })?;
    }
    Ok(())
}

/// Create a linked pair: the host end and the mesh end.
pub fn host_link(depth: usize) -> (HostLink, MeshPort) {
    let (cmd_tx, cmd_rx) = mpsc::channel(depth);
    let (reply_tx, reply_rx) = mpsc::channel(depth);
    (
        HostLink {
            commands: cmd_tx,
            replies: reply_rx,
            decoder: Decoder::new(),
        },
        MeshPort {
            commands: cmd_rx,
            replies: reply_tx,
            decoder: Decoder::new(),
        },
    )
}

/// Host end: sends commands, receives replies.
pub struct HostLink {
    commands: mpsc::Sender<QueueItem>,
    replies: mpsc::Receiver<QueueItem>,
    decoder: Decoder,
}

impl HostLink {
    /// Queue a command for the mesh task.
    pub fn send(&self, payload: &[u8]) -> Result<(), LinkError> {
        send_items(&self.commands, payload).inspect_err(|e| {
            error!("Command {:02X?} not queued: {}", payload, e);
        })
    }

    /// Queue a raw, already escaped item.
    pub fn send_raw(&self, item: QueueItem) -> Result<(), LinkError> {
        self.commands.try_send(item).map_err(|e| match e {
            TrySendError::Full(_) => LinkError::Full,
            TrySendError::Closed(_) => LinkError::Closed,
        })
    }

    /// Next complete reply, if one is queued.
    pub fn try_recv(&mut self) -> Result<Option<HostMessage>, LinkError> {
        loop {
            match self.replies.try_recv() {
                Ok(item) => {
                    if let Some(msg) = self.decoder.push_chunk(&item) {
                        return Ok(Some(msg));
                    }
                }
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => return Err(LinkError::Closed),
            }
        }
    }

    /// Wait for the next complete reply.
    pub async fn recv(&mut self) -> Result<HostMessage, LinkError> {
        loop {
            let item = self.replies.recv().await.ok_or(LinkError::Closed)?;
            if let Some(msg) = self.decoder.push_chunk(&item) {
                return Ok(msg);
            }
        }
    }
}

/// Mesh end: one item read per main-loop pass, replies sent immediately.
pub struct MeshPort {
    commands: mpsc::Receiver<QueueItem>,
    replies: mpsc::Sender<QueueItem>,
    decoder: Decoder,
}

impl MeshPort {
    /// Read at most one queued item. Returns a message if the item
    /// completed one.
    pub fn poll(&mut self) -> Option<HostMessage> {
        match self.commands.try_recv() {
            Ok(item) => self.decoder.push_chunk(&item),
            Err(_) => None,
        }
    }

    /// Whether the host has room for the longest reply. A queue shallower
    /// than that must be empty.
    pub fn reply_ready(&self) -> bool {
        let needed = MAX_REPLY_ITEMS.min(self.replies.max_capacity());
        self.replies.capacity() >= needed
    }

    /// Send a reply to the host. A full queue drops it.
    pub fn reply(&self, payload: &[u8]) -> Result<(), LinkError> {
        send_items(&self.replies, payload).inspect_err(|e| {
            error!("Reply {:02X?} dropped: {}", payload, e);
        })
    }
}
