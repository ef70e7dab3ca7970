//! xorshift64* generator used for every sampling draw.

use rand::{RngCore, SeedableRng};

/// Replacement for a zero seed; an all-zero xorshift state never advances.
const ZERO_SEED_STATE: u64 = 0x853c_49e6_748f_ea9b;
const MULTIPLIER: u64 = 0x2545_f491_4f6c_dd1d;

/// Deterministic xorshift64* generator: identical seeds give identical
/// sequences on every platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XorShift64Star {
    state: u64,
}

impl XorShift64Star {
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { ZERO_SEED_STATE } else { seed };
        Self { state }
    }

    pub fn state(&self) -> u64 {
        self.state
    }

    /// Advances the state and returns the high 32 bits of the scrambled output.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        (x.wrapping_mul(MULTIPLIER) >> 32) as u32
    }

    /// Uniform float in `[0, 1)` with 24 bits of precision.
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        unit_f32(self.next_u32())
    }
}

/// Maps a 32-bit draw to `[0, 1)` using its top 24 bits.
#[inline]
pub(crate) fn unit_f32(bits: u32) -> f32 {
    (bits >> 8) as f32 / 16_777_216.0
}

impl RngCore for XorShift64Star {
    fn next_u32(&mut self) -> u32 {
        XorShift64Star::next_u32(self)
    }

    fn next_u64(&mut self) -> u64 {
        let hi = XorShift64Star::next_u32(self) as u64;
        let lo = XorShift64Star::next_u32(self) as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = XorShift64Star::next_u32(self).to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for XorShift64Star {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u64::from_le_bytes(seed))
    }

    fn seed_from_u64(state: u64) -> Self {
        Self::new(state)
    }
}
