//! Virtual protocol timer.

use crate::radio::{Clock, COUNTS_PER_MS};
use embedded_hal::delay::DelayNs;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Nanoseconds per timer count.
const NS_PER_COUNT: u32 = 500_000;

/// Shared virtual clock. Every read moves it one count forward so polling
/// loops always reach their deadline. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    counts: Arc<AtomicU32>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, counts: u32) {
        self.counts.fetch_add(counts, Ordering::Relaxed);
    }

    pub fn advance_ms(&self, ms: u32) {
        self.advance(ms.saturating_mul(COUNTS_PER_MS));
    }

    /// Current time without advancing.
    pub fn now(&self) -> u32 {
        self.counts.load(Ordering::Relaxed)
    }
}

impl Clock for SimClock {
    fn counts(&self) -> u32 {
        self.counts.fetch_add(1, Ordering::Relaxed)
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance_ms(ms);
    }
}

impl DelayNs for SimClock {
    fn delay_ns(&mut self, ns: u32) {
        self.advance(ns / NS_PER_COUNT);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance_ms(ms);
    }
}
