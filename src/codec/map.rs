//! SID bitmaps and bit helpers.

use super::consts::SID_MASK;
use std::fmt;

/// Size of every mesh bitmap in bytes.
pub const MAP_SIZE: usize = 8;

/// 64-bit map of mesh members indexed by SID.
///
/// Bit `id & 7` of byte `id >> 3` represents SID `id`. Ids are masked to six
/// bits, matching how deployed nodes index their maps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SidMap([u8; MAP_SIZE]);

impl SidMap {
    pub const EMPTY: SidMap = SidMap([0; MAP_SIZE]);

    pub const fn from_bytes(bytes: [u8; MAP_SIZE]) -> Self {
        Self(bytes)
    }

    /// Build a map from bytes that were dithered on the wire.
    pub fn from_dithered(bytes: &[u8], dither: u8) -> Self {
        let mut map = [0u8; MAP_SIZE];
        for (dst, src) in map.iter_mut().zip(bytes) {
            *dst = src ^ dither;
        }
        Self(map)
    }

    /// Map holding a single SID.
    pub fn single(id: u8) -> Self {
        let mut map = Self::EMPTY;
        map.set(id);
        map
    }

    pub fn bytes(&self) -> [u8; MAP_SIZE] {
        self.0
    }

    /// Copy of the map XORed with `dither`, ready to be placed in a frame.
    pub fn dithered(&self, dither: u8) -> [u8; MAP_SIZE] {
        let mut out = self.0;
        for b in out.iter_mut() {
            *b ^= dither;
        }
        out
    }

    pub fn set(&mut self, id: u8) {
        let id = id & SID_MASK;
        self.0[(id >> 3) as usize] |= 1 << (id & 7);
    }

    pub fn clear(&mut self, id: u8) {
        let id = id & SID_MASK;
        self.0[(id >> 3) as usize] &= !(1 << (id & 7));
    }

    pub fn contains(&self, id: u8) -> bool {
        let id = id & SID_MASK;
        self.0[(id >> 3) as usize] & (1 << (id & 7)) != 0
    }

    /// True if any bit is set.
    pub fn any(&self) -> bool {
        self.0.iter().any(|&b| b != 0)
    }

    pub fn is_empty(&self) -> bool {
        !self.any()
    }

    /// Number of members.
    pub fn count(&self) -> u32 {
        self.0.iter().map(|b| b.count_ones()).sum()
    }

    /// Members in ascending SID order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..64u8).filter(move |&id| self.contains(id))
    }

    /// Members of `self` that are not in `other`.
    pub fn without(&self, other: &SidMap) -> SidMap {
        let mut out = self.0;
        for (dst, src) in out.iter_mut().zip(other.0.iter()) {
            *dst &= !src;
        }
        SidMap(out)
    }

    pub fn clear_all(&mut self) {
        self.0 = [0; MAP_SIZE];
    }
}

impl fmt::Display for SidMap {
    /// Lowercase hex, byte 0 first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Reverse the bit order of a byte.
///
/// The chip compares sync words LSB-first while frames are built MSB-first,
/// so every sync byte is reversed before it is written to a property.
pub fn reverse_byte(b: u8) -> u8 {
    b.reverse_bits()
}

/// Sequence number from a combined `(seq << 4) | ttl` byte.
pub fn seq_field(b: u8) -> u8 {
    b >> 4
}
