//! Backing stores for the persisted record.

use super::record::{MeshInfo, RmConfig, RECORD_LEN};
use super::ConfigError;
use log::{debug, info};
use std::sync::{Arc, Mutex};

/// Byte-level storage for one [`RmConfig`] record.
///
/// A store that has never been written reads as erased (all 0xFF).
pub trait ConfigStore {
    fn read(&mut self) -> Result<[u8; RECORD_LEN], ConfigError>;

    fn write(&mut self, record: &[u8; RECORD_LEN]) -> Result<(), ConfigError>;
}

impl<T: ConfigStore + ?Sized> ConfigStore for Box<T> {
    fn read(&mut self) -> Result<[u8; RECORD_LEN], ConfigError> {
        (**self).read()
    }

    fn write(&mut self, record: &[u8; RECORD_LEN]) -> Result<(), ConfigError> {
        (**self).write(record)
    }
}

/// In-memory store. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    record: Arc<Mutex<Option<[u8; RECORD_LEN]>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents, for inspection.
    pub fn snapshot(&self) -> RmConfig {
        let guard = match self.record.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        (*guard).map(RmConfig::from_bytes).unwrap_or_default()
    }
}

impl ConfigStore for MemoryStore {
    fn read(&mut self) -> Result<[u8; RECORD_LEN], ConfigError> {
        Ok(*self.snapshot().bytes())
    }

    fn write(&mut self, record: &[u8; RECORD_LEN]) -> Result<(), ConfigError> {
        let mut guard = match self.record.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(*record);
        Ok(())
    }
}

/// Record operations, each a read-modify-write of the store so fields
/// owned by other operations are never clobbered.
pub struct RmStore {
    store: Box<dyn ConfigStore + Send>,
}

impl RmStore {
    pub fn new(store: Box<dyn ConfigStore + Send>) -> Self {
        Self { store }
    }

    pub fn load(&mut self) -> Result<RmConfig, ConfigError> {
        self.store.read().map(RmConfig::from_bytes)
    }

    fn update(&mut self, f: impl FnOnce(&mut RmConfig)) -> Result<(), ConfigError> {
        let mut record = self.load()?;
        f(&mut record);
        self.store.write(record.bytes())
    }

    pub fn save_mesh_info(&mut self, mesh: &MeshInfo) -> Result<(), ConfigError> {
        self.update(|r| r.set_mesh_info(mesh))?;
        debug!("Mesh info saved: SID {}", mesh.sid);
        Ok(())
    }

    /// Saved mesh info, or `None` if the record is missing or corrupt.
    pub fn restore_mesh_info(&mut self) -> Result<Option<MeshInfo>, ConfigError> {
        Ok(self.load()?.mesh_info())
    }

    pub fn reset(&mut self) -> Result<(), ConfigError> {
        self.update(RmConfig::reset)?;
        info!("Mesh record reset");
        Ok(())
    }

    pub fn mfct_stamped(&mut self) -> Result<bool, ConfigError> {
        Ok(self.load()?.mfct_stamped())
    }

    pub fn set_mfct(&mut self) -> Result<(), ConfigError> {
        self.update(RmConfig::set_mfct)
    }

    pub fn clear_mfct(&mut self) -> Result<(), ConfigError> {
        self.update(RmConfig::clear_mfct)
    }

    pub fn freq_frac(&mut self) -> Result<Option<(u8, u8)>, ConfigError> {
        Ok(self.load()?.freq_frac())
    }

    pub fn save_freq_frac(&mut self, frac2: u8, frac3: u8) -> Result<(), ConfigError> {
        self.update(|r| r.set_freq_frac(frac2, frac3))?;
        info!("Frequency calibration saved: {:#04x} {:#04x}", frac2, frac3);
        Ok(())
    }
}
