//! Shared radio medium.
//!
//! Peers queue frames as (sync word, payload) pairs. A chip that starts
//! receiving with a matching sync word takes the first such frame; frames
//! nobody listens for stay queued. Every frame a chip transmits is recorded.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// A frame waiting to be received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reception {
    /// Sync word in on-air order.
    pub sync: Vec<u8>,
    /// Bytes following the sync word.
    pub payload: Vec<u8>,
}

/// A frame a chip transmitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    /// Sync word configured at the time, if the chip sent it.
    pub sync: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct AirState {
    pending: VecDeque<Reception>,
    sent: Vec<SentFrame>,
    sync_seen: bool,
}

/// The medium between a simulated chip and its scripted peers.
#[derive(Debug, Default)]
pub struct SimAir {
    state: Mutex<AirState>,
}

impl SimAir {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, AirState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a frame for the chip.
    pub fn queue(&self, sync: &[u8], payload: &[u8]) {
        self.lock().pending.push_back(Reception {
            sync: sync.to_vec(),
            payload: payload.to_vec(),
        });
    }

    /// Frames still waiting for a receiver.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Drop every queued frame.
    pub fn clear_pending(&self) {
        self.lock().pending.clear();
    }

    /// Take the first queued frame whose sync word is `sync`. A match also
    /// raises the sync-detect signal.
    pub fn receive(&self, sync: &[u8]) -> Option<Vec<u8>> {
        let mut state = self.lock();
        let pos = state.pending.iter().position(|r| r.sync == sync)?;
        state.sync_seen = true;
        state.pending.remove(pos).map(|r| r.payload)
    }

    pub fn record(&self, frame: SentFrame) {
        self.lock().sent.push(frame);
    }

    /// Everything transmitted so far.
    pub fn sent(&self) -> Vec<SentFrame> {
        self.lock().sent.clone()
    }

    /// Transmitted frames of at least `len` bytes whose byte `at` is `value`.
    pub fn sent_matching(&self, len: usize, at: usize, value: u8) -> Vec<Vec<u8>> {
        self.lock()
            .sent
            .iter()
            .filter(|f| f.payload.len() >= len && f.payload[at] == value)
            .map(|f| f.payload.clone())
            .collect()
    }

    pub fn clear_sent(&self) {
        self.lock().sent.clear();
    }

    /// Consume the sync-detect signal.
    pub fn take_sync(&self) -> bool {
        std::mem::take(&mut self.lock().sync_seen)
    }

    pub fn clear_sync(&self) {
        self.lock().sync_seen = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wisafe_rs_esp32_macros::esp32_test;

    #[esp32_test]
    fn test_receive_matches_sync() {
        let air = SimAir::new();
        air.queue(&[0xAA, 0xA8], &[]);
        air.queue(&[0xA9, 0x15], &[1, 2, 3]);
        assert_eq!(air.receive(&[0xA9, 0x14]), None);
        assert!(!air.take_sync());

        assert_eq!(air.receive(&[0xA9, 0x15]), Some(vec![1, 2, 3]));
        assert!(air.take_sync());
        assert!(!air.take_sync());
        assert_eq!(air.pending(), 1);
    }

    #[esp32_test]
    fn test_sent_frames_recorded() {
        let air = SimAir::new();
        air.record(SentFrame {
            sync: None,
            payload: vec![0x2A, 0xAA, 0xAA, 0xA8],
        });
        air.record(SentFrame {
            sync: Some(vec![0x00]),
            payload: vec![0x2A, 0xAA, 0xAA, 0xA9, 0x15, 3, 0, 0],
        });
        assert_eq!(air.sent().len(), 2);
        assert_eq!(air.sent_matching(8, 5, 3).len(), 1);
        air.clear_sent();
        assert!(air.sent().is_empty());
    }
}
