//! Record persistence for host (development) builds.
//!
//! Stores the 26-byte mesh record in a file so a simulated node keeps its
//! mesh across runs. Uses `~/.wisafe-rs-esp32/rmconfig.bin` by default.
//!
//! # Usage
//!
//! ```ignore
//! use wisafe_rs_esp32::config::RmStore;
//! use wisafe_rs_esp32::persistence_host::FileStore;
//!
//! let mut store = RmStore::new(Box::new(FileStore::open_default()?));
//! let info = store.restore_mesh_info()?;
//! ```

use crate::config::{ConfigError, ConfigStore, RECORD_LEN};
use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Get the default record file path.
///
/// Returns `~/.wisafe-rs-esp32/rmconfig.bin`
pub fn default_record_path() -> io::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home)
        .join(".wisafe-rs-esp32")
        .join("rmconfig.bin"))
}

/// File-backed [`ConfigStore`].
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open_default() -> io::Result<Self> {
        Ok(Self::new(default_record_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileStore {
    fn read(&mut self) -> Result<[u8; RECORD_LEN], ConfigError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No record file at {:?}, reading as erased", self.path);
                return Ok([0xFF; RECORD_LEN]);
            }
            Err(e) => return Err(e.into()),
        };

        if data.len() != RECORD_LEN {
            warn!(
                "Record file {:?} is {} bytes, expected {}",
                self.path,
                data.len(),
                RECORD_LEN
            );
            return Err(ConfigError::Corrupt);
        }
        let mut record = [0u8; RECORD_LEN];
        record.copy_from_slice(&data);
        Ok(record)
    }

    fn write(&mut self, record: &[u8; RECORD_LEN]) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, record)?;

        // Verify write by reading back
        let read_back = fs::read(&self.path)?;
        if read_back.as_slice() != record.as_slice() {
            return Err(ConfigError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Record verification failed: wrote {} bytes, read {} bytes",
                    RECORD_LEN,
                    read_back.len()
                ),
            )));
        }

        info!("Record saved to {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MeshInfo, RmStore};
    use crate::codec::SidMap;
    use std::env;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wisafe_rs_esp32_macros::esp32_test;

    // Counter to ensure unique test files even in parallel execution
    static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

    fn unique_record_path() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let pid = std::process::id();
        env::temp_dir().join(format!("wisafe-test-{}-{}.bin", pid, id))
    }

    #[esp32_test]
    fn test_missing_file_reads_erased() {
        let mut store = FileStore::new(unique_record_path());
        assert_eq!(store.read().unwrap(), [0xFF; RECORD_LEN]);
    }

    #[esp32_test]
    fn test_raw_roundtrip() {
        let path = unique_record_path();
        let mut store = FileStore::new(&path);
        let mut record = [0u8; RECORD_LEN];
        record[3] = 0x5A;
        store.write(&record).expect("Failed to save");
        assert_eq!(store.read().unwrap(), record);
        let _ = fs::remove_file(&path);
    }

    #[esp32_test]
    fn test_wrong_length_is_corrupt() {
        let path = unique_record_path();
        fs::write(&path, [0u8; 5]).unwrap();
        let mut store = FileStore::new(&path);
        assert!(matches!(store.read(), Err(ConfigError::Corrupt)));
        let _ = fs::remove_file(&path);
    }

    #[esp32_test]
    fn test_mesh_info_survives_reopen() {
        let path = unique_record_path();
        let info = MeshInfo {
            sid: 7,
            keys: [0x11, 0x22, 0x33],
            sid_map: SidMap::single(7),
            gateway_id: [1, 2, 3],
            sd_model: [0x42, 0x01],
        };

        let mut first = RmStore::new(Box::new(FileStore::new(&path)));
        first.save_mesh_info(&info).expect("Failed to save");
        drop(first);

        let mut second = RmStore::new(Box::new(FileStore::new(&path)));
        assert_eq!(second.restore_mesh_info().unwrap(), Some(info));
        let _ = fs::remove_file(&path);
    }
}
