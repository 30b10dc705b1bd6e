//! Sync-word detection.
//!
//! The chip raises a GPIO edge when it matches the programmed sync word. On
//! hardware the edge interrupt signals a task notification and the engine
//! blocks on it with a timeout. Detection is carried by the signal itself,
//! so no flag is shared with the interrupt handler.

/// Wait for the sync-detect signal.
pub trait SyncWait {
    /// Drop any signal raised so far.
    fn clear(&mut self);

    /// Block until a sync word is detected or `timeout_ms` expires.
    fn wait(&mut self, timeout_ms: u32) -> bool;
}

impl<T: SyncWait + ?Sized> SyncWait for Box<T> {
    fn clear(&mut self) {
        (**self).clear()
    }

    fn wait(&mut self, timeout_ms: u32) -> bool {
        (**self).wait(timeout_ms)
    }
}
