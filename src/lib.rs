//! WiSafe-2 mesh gateway firmware library.
//!
//! This library contains the mesh radio stack and its host bridge. Everything
//! except NVS persistence and the ESP32 board glue is platform-independent and
//! can be tested on the host machine without ESP32 hardware.

// Allow the crate to reference itself by name (needed for proc-macro generated code)
extern crate self as wisafe_rs_esp32;

pub mod bridge;
pub mod codec;
pub mod config;
pub mod mesh;
#[cfg(feature = "esp32")]
pub mod persistence;
#[cfg(not(target_os = "espidf"))]
pub mod persistence_host;
pub mod radio;
pub mod scheduler;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod status;

// Re-export commonly used items
pub use bridge::{host_link, HostCommand, HostLink, HostMessage, MeshPort};
pub use codec::{MeshCrc, SidMap};
pub use config::{ConfigError, MemoryStore, NodeConfig, RmConfig, RmStore};
pub use mesh::{EngineError, LearnState, MeshEngine, MeshState, RadioLink, RumorReason};
pub use radio::{RadioError, RadioProfile, Si446x};
pub use scheduler::{Liveness, Scheduler};
pub use status::{MeshStats, StatusServer};

#[cfg(feature = "esp32")]
static NVS_PARTITION: std::sync::Mutex<Option<esp_idf_svc::nvs::EspDefaultNvsPartition>> =
    std::sync::Mutex::new(None);

/// Shared handle to the default NVS partition.
///
/// `EspDefaultNvsPartition::take()` succeeds only once per boot, so the
/// first handle is kept and cloned for every later caller.
#[cfg(feature = "esp32")]
pub fn get_nvs_default_partition(
) -> Result<esp_idf_svc::nvs::EspDefaultNvsPartition, esp_idf_sys::EspError> {
    let mut guard = NVS_PARTITION
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(partition) = guard.as_ref() {
        return Ok(partition.clone());
    }
    let partition = esp_idf_svc::nvs::EspDefaultNvsPartition::take()?;
    *guard = Some(partition.clone());
    Ok(partition)
}

/// Link the ESP-IDF patches once. Tests call this before touching NVS.
#[cfg(feature = "esp32")]
pub fn ensure_esp_initialized() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(esp_idf_sys::link_patches);
}
