//! Protocol timer.
//!
//! Every protocol deadline is expressed in timer counts of 0.5 ms. The
//! coarser system tick (`SysTime`) advances every 125 ms.

use std::time::{Duration, Instant};

/// Timer counts per millisecond.
pub const COUNTS_PER_MS: u32 = 2;
/// Timer counts per system tick (125 ms).
pub const COUNTS_PER_SYS_TICK: u32 = 250;

pub const ONE_SECOND: u32 = 2000;
pub const FIVE_SECONDS: u32 = 10_000;

/// Monotonic protocol clock.
pub trait Clock {
    /// Free-running count of 0.5 ms units. Wraps.
    fn counts(&self) -> u32;

    fn delay_ms(&mut self, ms: u32);

    /// Counts elapsed since `start`, wrap-safe.
    fn since(&self, start: u32) -> u32 {
        self.counts().wrapping_sub(start)
    }
}

/// System tick counter kept across the count wrap.
///
/// Whole ticks are folded in from the counts elapsed since the last
/// update, so it must be updated at least once per count period (about
/// 24 days).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SysTicks {
    ticks: u32,
    mark: u32,
}

impl SysTicks {
    /// Zero ticks at `counts`.
    pub fn starting_at(counts: u32) -> Self {
        Self {
            ticks: 0,
            mark: counts,
        }
    }

    /// Fold in the time up to `counts` and return the tick count.
    pub fn update(&mut self, counts: u32) -> u32 {
        let whole = counts.wrapping_sub(self.mark) / COUNTS_PER_SYS_TICK;
        self.ticks = self.ticks.wrapping_add(whole);
        self.mark = self.mark.wrapping_add(whole * COUNTS_PER_SYS_TICK);
        self.ticks
    }
}

/// Wall clock backed by `Instant`.
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn counts(&self) -> u32 {
        let us = self.start.elapsed().as_micros();
        (us / 500) as u32
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(ms as u64));
    }
}
