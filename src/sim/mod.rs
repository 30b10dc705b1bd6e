//! Simulated radio medium.
//!
//! This module contains:
//! - [`air`]: The shared medium peers queue frames on
//! - [`chip`]: An Si4461 behind `embedded-hal` SPI and GPIO traits
//! - [`clock`]: A virtual protocol timer
//! - [`peer`]: Scripted mesh members
//!
//! A gateway built with [`gateway`] runs the real driver, link and engine;
//! only the silicon and the other nodes are simulated.

pub mod air;
pub mod chip;
pub mod clock;
pub mod peer;

pub use air::{Reception, SentFrame, SimAir};
pub use chip::{sim_radio, SimChip, SimPin, SimRadio, SimSync};
pub use clock::SimClock;
pub use peer::Peer;

use crate::bridge::{host_link, HostLink};
use crate::config::{NodeConfig, RmStore};
use crate::mesh::{Lfsr, MeshEngine, RadioLink};
use crate::status::MeshStats;
use std::sync::Arc;

/// A simulated gateway and the handles a test or demo drives it with.
pub struct SimGateway {
    pub engine: MeshEngine<SimRadio, SimClock>,
    pub host: HostLink,
    pub chip: SimChip,
    pub clock: SimClock,
    pub air: Arc<SimAir>,
}

/// Build a gateway on `air` and run its init.
pub fn gateway(config: &NodeConfig, air: Arc<SimAir>, store: RmStore) -> SimGateway {
    let clock = SimClock::new();
    let (radio, chip) = sim_radio(&air, &clock);
    let stats = Arc::new(MeshStats::new());
    let link = RadioLink::new(radio, clock.clone(), Lfsr::new([0x12, 0x34, 0x56]), stats);
    let (host, port) = host_link(config.host_queue_depth);
    let mut engine = MeshEngine::new(link, store, port, config);
    engine.init();
    SimGateway {
        engine,
        host,
        chip,
        clock,
        air,
    }
}
