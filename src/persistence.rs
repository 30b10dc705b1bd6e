//! Mesh record persistence in ESP32 Non-Volatile Storage (NVS).
//!
//! The 26-byte record (mesh membership, manufacturing stamp, frequency
//! calibration) is stored as one raw blob so a node rejoins its mesh after
//! a reboot without a new join.
//!
//! # Security
//!
//! The record holds the mesh key. For production devices enable NVS
//! encryption; development builds do not encrypt NVS data.
//!
//! # Usage
//!
//! ```ignore
//! use wisafe_rs_esp32::config::RmStore;
//! use wisafe_rs_esp32::persistence::NvsStore;
//!
//! let mut store = RmStore::new(Box::new(NvsStore::new(persistence::init_nvs()?)));
//! let info = store.restore_mesh_info()?;
//! ```

use crate::config::{ConfigError, ConfigStore, RECORD_LEN};
use esp_idf_svc::nvs::{EspNvs, NvsDefault};
use esp_idf_sys::EspError;
use log::info;
use std::io;

/// NVS namespace for the mesh record.
const NVS_NAMESPACE: &str = "wisafe";

/// NVS key for the mesh record.
const RECORD_KEY: &str = "rmconfig";

fn nvs_error(e: EspError) -> ConfigError {
    ConfigError::Io(io::Error::other(format!("NVS: {:?}", e)))
}

/// NVS-backed [`ConfigStore`].
pub struct NvsStore {
    nvs: EspNvs<NvsDefault>,
}

impl NvsStore {
    pub fn new(nvs: EspNvs<NvsDefault>) -> Self {
        Self { nvs }
    }

    /// Remove the record entirely; the next read sees erased flash.
    pub fn erase(&mut self) -> Result<(), ConfigError> {
        self.nvs.remove(RECORD_KEY).map_err(nvs_error)?;
        log::warn!("Mesh record removed from NVS");
        Ok(())
    }
}

impl ConfigStore for NvsStore {
    fn read(&mut self) -> Result<[u8; RECORD_LEN], ConfigError> {
        let mut buf = [0u8; RECORD_LEN + 1];
        match self.nvs.get_raw(RECORD_KEY, &mut buf).map_err(nvs_error)? {
            None => {
                log::debug!("No mesh record in NVS");
                Ok([0xFF; RECORD_LEN])
            }
            Some(bytes) if bytes.len() == RECORD_LEN => {
                let mut record = [0u8; RECORD_LEN];
                record.copy_from_slice(bytes);
                Ok(record)
            }
            Some(bytes) => {
                log::error!("Stored record has {} bytes, expected {}", bytes.len(), RECORD_LEN);
                Err(ConfigError::Corrupt)
            }
        }
    }

    /// Write with read-back verification to catch silent flash failures.
    fn write(&mut self, record: &[u8; RECORD_LEN]) -> Result<(), ConfigError> {
        self.nvs.set_raw(RECORD_KEY, record).map_err(nvs_error)?;

        let mut verify_buf = [0u8; RECORD_LEN + 1];
        let read_bytes = self
            .nvs
            .get_raw(RECORD_KEY, &mut verify_buf)
            .map_err(|e| {
                log::error!("Failed to read back record after save: {:?}", e);
                nvs_error(e)
            })?
            .ok_or_else(|| {
                log::error!("Record not found after save - possible flash failure");
                ConfigError::Corrupt
            })?;

        if read_bytes != record.as_slice() {
            log::error!("Record verification failed - data mismatch after save");
            return Err(ConfigError::Corrupt);
        }

        info!("Mesh record saved and verified in NVS");
        Ok(())
    }
}

/// Open the mesh record namespace.
///
/// Uses a shared partition handle so `EspNvsPartition::take()` is only
/// called once across the application. Safe to call multiple times.
pub fn init_nvs() -> Result<EspNvs<NvsDefault>, EspError> {
    let partition = crate::get_nvs_default_partition()?;
    EspNvs::new(partition, NVS_NAMESPACE, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SidMap;
    use crate::config::{MeshInfo, RmStore};
    use wisafe_rs_esp32_macros::esp32_test;

    fn fresh_store() -> NvsStore {
        crate::ensure_esp_initialized();
        let mut store = NvsStore::new(init_nvs().expect("Failed to init NVS"));
        let _ = store.erase();
        store
    }

    #[esp32_test]
    fn test_init_nvs() {
        crate::ensure_esp_initialized();
        let nvs = init_nvs();
        assert!(nvs.is_ok(), "Failed to initialize NVS: {:?}", nvs.err());
    }

    #[esp32_test]
    fn test_erased_record_reads_ff() {
        let mut store = fresh_store();
        assert_eq!(store.read().unwrap(), [0xFF; RECORD_LEN]);
    }

    #[esp32_test]
    fn test_mesh_info_roundtrip() {
        let mut rm = RmStore::new(Box::new(fresh_store()));
        let info = MeshInfo {
            sid: 4,
            keys: [0x21, 0x43, 0x65],
            sid_map: SidMap::single(4),
            gateway_id: [1, 2, 3],
            sd_model: [0, 0],
        };
        rm.save_mesh_info(&info).expect("Failed to save");
        assert_eq!(rm.restore_mesh_info().unwrap(), Some(info));
    }

    #[esp32_test]
    fn test_stamp_survives_reset() {
        let mut rm = RmStore::new(Box::new(fresh_store()));
        rm.set_mfct().unwrap();
        rm.reset().unwrap();
        assert!(rm.mfct_stamped().unwrap());
    }
}
