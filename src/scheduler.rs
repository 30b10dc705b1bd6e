//! Mesh task scheduling.
//!
//! One task runs the mesh main loop. Between passes it waits on a release
//! signal raised by a one-shot timer; the timer is re-armed after each pass,
//! so the loop period is the tick period plus the time the pass took.
//!
//! The pass itself is blocking radio I/O and runs on the blocking pool via
//! `spawn_blocking`. A liveness counter advances once per pass and a
//! watchdog task reports when it stops moving.

use crate::config::NodeConfig;
use crate::mesh::MeshEngine;
use crate::radio::{Clock, Transceiver};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Watchdog window, in tick periods.
const WATCHDOG_TICKS: u32 = 3;

/// Main-loop pass counter fed to the watchdog.
#[derive(Debug, Default)]
pub struct Liveness(AtomicU32);

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn beat(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Drives a [`MeshEngine`] once per tick.
pub struct Scheduler<R, C> {
    engine: Arc<Mutex<MeshEngine<R, C>>>,
    release: Arc<Notify>,
    liveness: Arc<Liveness>,
    cancel: CancellationToken,
    tick_period: Duration,
    release_timeout: Duration,
}

impl<R, C> Scheduler<R, C>
where
    R: Transceiver + Send + 'static,
    C: Clock + Send + 'static,
{
    pub fn new(engine: MeshEngine<R, C>, config: &NodeConfig) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            release: Arc::new(Notify::new()),
            liveness: Arc::new(Liveness::new()),
            cancel: CancellationToken::new(),
            tick_period: config.tick_period(),
            release_timeout: config.release_timeout(),
        }
    }

    /// Shared handle to the engine, for callers outside the mesh task.
    pub fn engine(&self) -> Arc<Mutex<MeshEngine<R, C>>> {
        self.engine.clone()
    }

    pub fn liveness(&self) -> Arc<Liveness> {
        self.liveness.clone()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the mesh task and the watchdog.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Start the one-shot release timer.
    fn arm_timer(&self) {
        let release = self.release.clone();
        let cancel = self.cancel.clone();
        let period = self.tick_period;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(period) => release.notify_one(),
            }
        });
    }

    /// Wait for the release timer. Returns false if it never fired within
    /// the release timeout; the caller runs the pass anyway.
    pub async fn wait_release(&self) -> bool {
        match timeout(self.release_timeout, self.release.notified()).await {
            Ok(()) => true,
            Err(_) => {
                error!("release timer did not fire");
                false
            }
        }
    }

    /// Run one main-loop pass on the blocking pool.
    pub async fn run_pass(&self) {
        let engine = self.engine.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut engine = lock_engine(&engine);
            engine.main_loop();
        })
        .await;
        if let Err(e) = result {
            error!("Main-loop pass panicked: {}", e);
        }
        self.liveness.beat();
    }

    /// Run passes until shut down.
    pub async fn run(&self) {
        info!(
            "Mesh task started, tick {} ms",
            self.tick_period.as_millis()
        );
        self.arm_timer();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                released = self.wait_release() => {
                    if !released {
                        debug!("Running pass without release");
                    }
                }
            }
            self.run_pass().await;
            self.arm_timer();
        }
        info!("Mesh task stopped after {} passes", self.liveness.count());
    }

    /// Spawn the watchdog. It logs an error whenever a whole watchdog
    /// window passes without a main-loop pass.
    pub fn spawn_watchdog(&self) -> JoinHandle<()> {
        let liveness = self.liveness.clone();
        let cancel = self.cancel.clone();
        let window = self.tick_period * WATCHDOG_TICKS;
        tokio::spawn(async move {
            let mut last = liveness.count();
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(window) => {}
                }
                let now = liveness.count();
                if now == last {
                    error!("Mesh task stalled: no pass in {} ms", window.as_millis());
                }
                last = now;
            }
        })
    }
}

fn lock_engine<R, C>(engine: &Mutex<MeshEngine<R, C>>) -> MutexGuard<'_, MeshEngine<R, C>> {
    match engine.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("Mesh engine mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}
