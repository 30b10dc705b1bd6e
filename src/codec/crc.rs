//! Mesh CRC-16.
//!
//! Polynomial 0x8005, MSB-first, bit-serial. The register is seeded from
//! `(Key1 << 8) | Key2` once a mesh ID is assigned, otherwise from zero
//! (0x29 when scrambling is enabled). The complemented value is appended
//! big-endian, so running the register over data plus CRC always leaves
//! [`CRC_CHECK_OK`].

use super::consts::SID_MASK;

const POLY: u16 = 0x8005;

/// Register value after a frame with a valid trailing CRC.
pub const CRC_CHECK_OK: u16 = 0x800D;

/// Seed used for unjoined nodes when scrambling is enabled.
const SCRAMBLED_NULL_SEED: u16 = 0x29;

/// Running CRC register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshCrc {
    reg: u16,
}

impl MeshCrc {
    /// Start a CRC with an explicit seed.
    pub const fn with_seed(seed: u16) -> Self {
        Self { reg: seed }
    }

    /// Start a CRC seeded from the mesh keys.
    pub fn for_keys(keys: [u8; 3], scramble: bool) -> Self {
        let seed = if keys[0] & SID_MASK != 0 {
            ((keys[1] as u16) << 8) | keys[2] as u16
        } else if scramble {
            SCRAMBLED_NULL_SEED
        } else {
            0
        };
        Self::with_seed(seed)
    }

    /// Clock one byte through the register.
    pub fn update(&mut self, byte: u8) {
        for bit in (0..8).rev() {
            let data = (byte >> bit) & 1 == 1;
            let top = self.reg & 0x8000 != 0;
            self.reg <<= 1;
            if data != top {
                self.reg ^= POLY;
            }
        }
    }

    pub fn update_slice(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.update(b);
        }
    }

    /// Raw register value. After clocking a frame plus its CRC this equals
    /// [`CRC_CHECK_OK`] for an intact frame.
    pub fn value(&self) -> u16 {
        self.reg
    }

    /// Complemented register, the value appended to a frame.
    pub fn finish(&self) -> u16 {
        !self.reg
    }

    pub fn is_ok(&self) -> bool {
        self.reg == CRC_CHECK_OK
    }

    /// Clock `bytes` (data followed by its CRC) and check the residue.
    pub fn check(mut self, bytes: &[u8]) -> bool {
        self.update_slice(bytes);
        self.is_ok()
    }
}

/// One-shot CRC of `bytes` from the given register.
pub fn crc_of(mut crc: MeshCrc, bytes: &[u8]) -> u16 {
    crc.update_slice(bytes);
    crc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wisafe_rs_esp32_macros::esp32_test;

    #[esp32_test]
    fn test_reference_vectors() {
        assert_eq!(crc_of(MeshCrc::with_seed(0), &[0x01, 0x85]), 0xFAE1);
        assert_eq!(crc_of(MeshCrc::with_seed(0x3344), &[0x07, 0x05]), 0xC67A);
    }

    #[esp32_test]
    fn test_residue_after_appended_crc() {
        let keys = [0x07, 0x33, 0x44];
        let payload = [0x0F, 0x02, 0x22, 0x02, 0x15, 0x99, 0x7E, 0x7D];
        let crc = crc_of(MeshCrc::for_keys(keys, false), &payload);

        let mut check = MeshCrc::for_keys(keys, false);
        check.update_slice(&payload);
        check.update_slice(&crc.to_be_bytes());
        assert!(check.is_ok());
        assert_eq!(check.value(), CRC_CHECK_OK);
    }

    #[esp32_test]
    fn test_corruption_breaks_residue() {
        let payload = [0x03, 0x01, 0x05, 0x07, 0x33, 0x44];
        let crc = crc_of(MeshCrc::with_seed(0), &payload);
        let mut bad = payload;
        bad[2] ^= 0x10;

        let mut check = MeshCrc::with_seed(0);
        check.update_slice(&bad);
        check.update_slice(&crc.to_be_bytes());
        assert!(!check.is_ok());
    }

    #[esp32_test]
    fn test_seed_rules() {
        assert_eq!(MeshCrc::for_keys([0x04, 0x12, 0x34], false).value(), 0x1234);
        // Mesh ID lives in the low six bits of Key0.
        assert_eq!(MeshCrc::for_keys([0xC0, 0x12, 0x34], false).value(), 0);
        assert_eq!(MeshCrc::for_keys([0x00, 0x12, 0x34], true).value(), 0x29);
        assert_eq!(MeshCrc::for_keys([0x00, 0x00, 0x00], false).value(), 0);
    }
}
