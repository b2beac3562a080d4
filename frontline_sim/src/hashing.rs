use std::hash::Hasher;

use sim_schema::{PlayerId, UnitId};

/// A deterministic FNV-1a 64-bit hasher.
///
/// `DefaultHasher` is randomized per process, so every seed that has to agree
/// across simulation participants is derived through this hasher instead.
#[derive(Debug, Default)]
pub struct FnvHasher {
    state: u64,
}

impl FnvHasher {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self {
            state: Self::OFFSET_BASIS,
        }
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= byte as u64;
            self.state = self.state.wrapping_mul(Self::PRIME);
        }
    }
}

/// Hashes raw bytes. Only byte slices are fed in so the result does not depend
/// on `Hash` impl details of std types.
pub fn stable_hash(bytes: &[u8]) -> u64 {
    let mut hasher = FnvHasher::new();
    hasher.write(bytes);
    hasher.finish()
}

/// Seed for per-unit streams (interception rolls).
pub fn unit_seed(unit: UnitId) -> u64 {
    stable_hash(&unit.0.to_le_bytes())
}

/// Seed for a nation controller: hash(player id) + hash(session id).
pub fn player_seed(player: PlayerId, session_id: &str) -> u64 {
    stable_hash(&player.0.to_le_bytes()).wrapping_add(stable_hash(session_id.as_bytes()))
}
