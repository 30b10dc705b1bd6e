//! 24-bit LFSR used for listen-window jitter.
//!
//! Maximum-length feedback from taps 24, 23, 22 and 17, shifted byte-wise
//! with an extra XOR per byte to break up runs.

use rand_core::{OsRng, RngCore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lfsr {
    state: [u8; 3],
}

impl Lfsr {
    pub fn new(seed: [u8; 3]) -> Self {
        Self { state: seed }
    }

    /// Seed from the operating system RNG.
    pub fn from_os() -> Self {
        let mut seed = [0u8; 3];
        OsRng.fill_bytes(&mut seed);
        Self::new(seed)
    }

    pub fn state(&self) -> [u8; 3] {
        self.state
    }

    /// Advance one step.
    pub fn step(&mut self) {
        let [r0, r1, r2] = self.state;
        let mut taps = 1u8;
        for mask in [0x80, 0x40, 0x20, 0x01] {
            if r2 & mask != 0 {
                taps += 1;
            }
        }
        let n2 = ((r2 << 1) | (r1 >> 7)) ^ 0x12;
        let n1 = ((r1 << 1) | (r0 >> 7)) ^ 0x34;
        let n0 = ((r0 << 1) | (taps & 1)) ^ 0x56;
        self.state = [n0, n1, n2];
    }

    /// Advance and return the low 16 bits of the register.
    pub fn next_u16(&mut self) -> u16 {
        self.step();
        u16::from_le_bytes([self.state[0], self.state[1]])
    }

    /// Value in `0..bound`. `bound` must be non-zero.
    pub fn below(&mut self, bound: u16) -> u16 {
        self.next_u16() % bound.max(1)
    }
}

impl Default for Lfsr {
    fn default() -> Self {
        Self::from_os()
    }
}
