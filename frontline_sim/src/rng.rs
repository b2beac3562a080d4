//! Seeded random stream shared by every decision that must replay identically
//! on all simulation participants.
//!
//! ChaCha8 is used rather than `SmallRng` because its output is specified
//! bit-for-bit independent of platform and `rand` release.

use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PseudoRandom {
    rng: ChaCha8Rng,
}

impl PseudoRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Uniform integer in `[min, max)`. Returns `min` for an empty range.
    pub fn next_int(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        self.rng.gen_range(min..max)
    }

    /// Uniform float in `[0, 1)`.
    pub fn next_float(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// True with probability `1 / odds`.
    pub fn chance(&mut self, odds: u32) -> bool {
        if odds <= 1 {
            return true;
        }
        self.rng.gen_range(0..odds) == 0
    }

    /// Fair coin flip.
    pub fn coin(&mut self) -> bool {
        self.chance(2)
    }

    pub fn rand_element<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.rng)
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }
}
