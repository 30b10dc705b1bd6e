//! WiSafe-2 gateway firmware binary.
//!
//! Brings up the Si4461 on the gateway board, restores the mesh record from
//! NVS and runs the mesh main loop on the scheduler. Gateway statistics are
//! served at `http://<board>:8080/status`.

#[cfg(feature = "esp32")]
fn main() {
    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();

    // Initialize ESP-IDF logger for log crate integration
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("=== WiSafe gateway starting ===");

    if let Err(e) = firmware::run() {
        log::error!("Gateway stopped: {}", e);
    }
}

#[cfg(feature = "esp32")]
mod firmware {
    use esp_idf_hal::peripherals::Peripherals;
    use log::{info, warn};
    use std::sync::Arc;
    use wisafe_rs_esp32::config::{NodeConfig, RmStore};
    use wisafe_rs_esp32::mesh::{Lfsr, MeshEngine, RadioLink};
    use wisafe_rs_esp32::persistence::{self, NvsStore};
    use wisafe_rs_esp32::radio::esp32::board_radio;
    use wisafe_rs_esp32::radio::SystemClock;
    use wisafe_rs_esp32::{host_link, MeshStats, Scheduler, StatusServer};

    pub fn run() -> Result<(), Box<dyn std::error::Error>> {
        let config = NodeConfig::default();
        config.validate()?;

        let p = Peripherals::take()?;
        let radio = board_radio(
            p.spi2,
            p.pins.gpio12,
            p.pins.gpio11,
            p.pins.gpio13,
            p.pins.gpio10,
            p.pins.gpio5,
            p.pins.gpio4,
            p.pins.gpio1,
        )?;
        let store = RmStore::new(Box::new(NvsStore::new(persistence::init_nvs()?)));

        let stats = Arc::new(MeshStats::new());
        let link = RadioLink::new(radio, SystemClock::new(), Lfsr::from_os(), stats.clone());
        // The host end stays open for the application bridge.
        let (_host, port) = host_link(config.host_queue_depth);
        let mut engine = MeshEngine::new(link, store, port, &config);
        engine.init();
        info!(
            "Gateway ready: SID {}, learn state {}",
            engine.state().sid,
            engine.learn_state()
        );

        let _status_server = match StatusServer::start(None, config.status_port, stats) {
            Ok(server) => Some(server),
            Err(e) => {
                warn!("Failed to start status server: {}", e);
                None
            }
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(async {
            let scheduler = Scheduler::new(engine, &config);
            let _watchdog = scheduler.spawn_watchdog();
            scheduler.run().await;
        });
        Ok(())
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo run --bin host-node --features sim' for the host demo.");
}
