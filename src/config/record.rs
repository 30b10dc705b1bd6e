//! Persisted mesh record.
//!
//! Layout (26 bytes):
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0..2 | magic keys `56 CD` |
//! | 2 | SID |
//! | 3..6 | mesh key |
//! | 6..14 | SID map |
//! | 14..17 | gateway ID |
//! | 17..19 | SD model |
//! | 19 | XOR checksum of bytes 0..19 |
//! | 20..22 | manufacturing stamp |
//! | 22..24 | frequency calibration keys |
//! | 24..26 | FREQ_CONTROL_FRAC2 / FRAC3 |

use crate::codec::consts::{FREQ_KEY0, FREQ_KEY1, MFCT_STAMP0, MFCT_STAMP1};
use crate::codec::SidMap;

pub const RECORD_LEN: usize = 26;

const MAGIC: [u8; 2] = [0x56, 0xCD];
const SID: usize = 2;
const KEYS: usize = 3;
const SID_MAP: usize = 6;
const GATEWAY_ID: usize = 14;
const SD_MODEL: usize = 17;
const CHECKSUM: usize = 19;
const MFCT: usize = 20;
const FREQ_KEYS: usize = 22;
const FREQ_FRAC: usize = 24;

/// Mesh membership as saved across reboots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshInfo {
    pub sid: u8,
    pub keys: [u8; 3],
    pub sid_map: SidMap,
    pub gateway_id: [u8; 3],
    pub sd_model: [u8; 2],
}

/// Raw persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RmConfig([u8; RECORD_LEN]);

impl RmConfig {
    /// A record never written: erased flash.
    pub const ERASED: RmConfig = RmConfig([0xFF; RECORD_LEN]);

    pub fn from_bytes(bytes: [u8; RECORD_LEN]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> &[u8; RECORD_LEN] {
        &self.0
    }

    fn checksum(&self) -> u8 {
        self.0[..CHECKSUM].iter().fold(0, |acc, b| acc ^ b)
    }

    /// Overwrite the mesh fields and recompute the checksum.
    pub fn set_mesh_info(&mut self, info: &MeshInfo) {
        self.0[..2].copy_from_slice(&MAGIC);
        self.0[SID] = info.sid;
        self.0[KEYS..KEYS + 3].copy_from_slice(&info.keys);
        self.0[SID_MAP..SID_MAP + 8].copy_from_slice(&info.sid_map.bytes());
        self.0[GATEWAY_ID..GATEWAY_ID + 3].copy_from_slice(&info.gateway_id);
        self.0[SD_MODEL..SD_MODEL + 2].copy_from_slice(&info.sd_model);
        self.0[CHECKSUM] = self.checksum();
    }

    /// Mesh fields, if the magic keys and checksum are intact.
    pub fn mesh_info(&self) -> Option<MeshInfo> {
        if self.0[..2] != MAGIC || self.checksum() != self.0[CHECKSUM] {
            return None;
        }
        let mut sid_map = [0u8; 8];
        sid_map.copy_from_slice(&self.0[SID_MAP..SID_MAP + 8]);
        Some(MeshInfo {
            sid: self.0[SID],
            keys: [self.0[KEYS], self.0[KEYS + 1], self.0[KEYS + 2]],
            sid_map: SidMap::from_bytes(sid_map),
            gateway_id: [
                self.0[GATEWAY_ID],
                self.0[GATEWAY_ID + 1],
                self.0[GATEWAY_ID + 2],
            ],
            sd_model: [self.0[SD_MODEL], self.0[SD_MODEL + 1]],
        })
    }

    /// Erase the mesh fields and checksum. Stamp and calibration survive.
    pub fn reset(&mut self) {
        self.0[..MFCT].fill(0xFF);
    }

    pub fn mfct_stamped(&self) -> bool {
        self.0[MFCT] == MFCT_STAMP0 && self.0[MFCT + 1] == MFCT_STAMP1
    }

    pub fn set_mfct(&mut self) {
        self.0[MFCT] = MFCT_STAMP0;
        self.0[MFCT + 1] = MFCT_STAMP1;
    }

    pub fn clear_mfct(&mut self) {
        self.0[MFCT] = 0xFF;
        self.0[MFCT + 1] = 0xFF;
    }

    /// Persisted frequency fractions, if a calibration was saved.
    pub fn freq_frac(&self) -> Option<(u8, u8)> {
        if self.0[FREQ_KEYS] == FREQ_KEY0 && self.0[FREQ_KEYS + 1] == FREQ_KEY1 {
            Some((self.0[FREQ_FRAC], self.0[FREQ_FRAC + 1]))
        } else {
            None
        }
    }

    pub fn set_freq_frac(&mut self, frac2: u8, frac3: u8) {
        self.0[FREQ_KEYS] = FREQ_KEY0;
        self.0[FREQ_KEYS + 1] = FREQ_KEY1;
        self.0[FREQ_FRAC] = frac2;
        self.0[FREQ_FRAC + 1] = frac3;
    }
}

impl Default for RmConfig {
    fn default() -> Self {
        Self::ERASED
    }
}
