//! Host gateway demo over a simulated radio medium.
//!
//! Runs the real driver, link and engine against a simulated Si4461 and one
//! scripted neighbour:
//! - the gateway learns into the neighbour's mesh on first start
//! - the neighbour then sends it an SD rumor every few seconds
//! - host-bound replies and reports are logged
//! - status JSON is served at http://localhost:8080/status
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin host-node --features sim [-- config.json]
//! ```

use log::{error, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wisafe_rs_esp32::bridge::{extended, spimsg};
use wisafe_rs_esp32::codec::consts::msg;
use wisafe_rs_esp32::codec::{RumorFields, SidMap};
use wisafe_rs_esp32::config::{MemoryStore, NodeConfig, RmStore};
use wisafe_rs_esp32::mesh::CMD_LEARN;
use wisafe_rs_esp32::persistence_host::FileStore;
use wisafe_rs_esp32::sim::{self, Peer, SimAir, SimGateway};
use wisafe_rs_esp32::{Scheduler, StatusServer};

/// Mesh keys of the simulated neighbour's mesh.
const DEMO_KEYS: [u8; 3] = [0x05, 0x12, 0x34];
const NEIGHBOUR_SID: u8 = 2;
/// SID the neighbour hands out to the gateway.
const GATEWAY_SID: u8 = 5;
const RUMOR_PERIOD: Duration = Duration::from_secs(10);

fn load_config() -> NodeConfig {
    let Some(path) = std::env::args().nth(1) else {
        return NodeConfig::default();
    };
    match NodeConfig::load(Path::new(&path)) {
        Ok(config) => {
            info!("Loaded config from {}", path);
            config
        }
        Err(e) => {
            error!("Invalid config {}: {}", path, e);
            std::process::exit(1);
        }
    }
}

fn open_store() -> RmStore {
    match FileStore::open_default() {
        Ok(store) => {
            info!("Mesh record at {}", store.path().display());
            RmStore::new(Box::new(store))
        }
        Err(e) => {
            warn!("No record file ({}), mesh will not survive a restart", e);
            RmStore::new(Box::new(MemoryStore::new()))
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("=== WiSafe host gateway starting ===");

    let config = load_config();
    let air = SimAir::new();
    let SimGateway {
        engine, mut host, ..
    } = sim::gateway(&config, air.clone(), open_store());

    let keys = if engine.state().is_joined() {
        engine.state().keys
    } else {
        DEMO_KEYS
    };
    let neighbour = Peer::new(NEIGHBOUR_SID, keys);
    if !engine.state().is_joined() {
        info!("Learning into the neighbour's mesh");
        neighbour.invite(&air);
        neighbour.join_ack(&air, GATEWAY_SID, SidMap::single(NEIGHBOUR_SID));
        if let Err(e) = host.send(&[spimsg::EXTENDED_REQ, extended::BUTTON_PRESS, CMD_LEARN]) {
            error!("Could not queue learn command: {}", e);
        }
    }

    let _status_server = match StatusServer::start(None, config.status_port, engine.stats().clone())
    {
        Ok(server) => {
            info!(
                "Status server running at http://localhost:{}/status",
                config.status_port
            );
            Some(server)
        }
        Err(e) => {
            warn!("Failed to start status server: {}", e);
            None
        }
    };

    let scheduler = Arc::new(Scheduler::new(engine, &config));
    let watchdog = scheduler.spawn_watchdog();
    let runner = scheduler.clone();
    let mesh_task = tokio::spawn(async move { runner.run().await });

    info!("Entering main loop (Ctrl+C to exit)...");
    let mut rumors = tokio::time::interval(RUMOR_PERIOD);
    let mut seq = 0u8;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            reply = host.recv() => match reply {
                Ok(msg) => info!("Host <- {:02X?}", msg.as_slice()),
                Err(e) => {
                    error!("Host link closed: {}", e);
                    break;
                }
            },
            _ = rumors.tick() => {
                // Only one exchange is scripted at a time.
                if air.pending() == 0 {
                    let mut pass_thru = [0u8; 9];
                    pass_thru[0] = seq;
                    let fields = RumorFields {
                        seq: seq & 0x0F,
                        pass_thru,
                        pass_thru_len: 1,
                        ..RumorFields::default()
                    };
                    neighbour.deliver(&air, &neighbour.rumor(msg::SD_RUMOR, &fields), false);
                    seq = seq.wrapping_add(1);
                }
            }
        }
    }

    info!("Shutting down");
    scheduler.shutdown();
    if let Err(e) = mesh_task.await {
        error!("Mesh task failed: {}", e);
    }
    let _ = watchdog.await;
}
