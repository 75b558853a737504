//! Deterministic RNG hierarchy.
//!
//! A master seed generates sub-seeds for each `(run_id, stream, index)` tuple.
//! Sub-seeds are derived via BLAKE3, independently of thread scheduling order,
//! so Monte-Carlo paths and synthetic bars are identical at any thread count.

use rand::rngs::StdRng;
use rand::SeedableRng;
use regimelab_core::domain::RunId;

#[derive(Debug, Clone)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive a sub-seed for one named stream (a symbol, "mc_path", ...) and index.
    ///
    /// Derivation is hash-based: asking for `("AAA", 0)` then `("BBB", 0)`
    /// gives the same seeds as the reverse order.
    pub fn sub_seed(&self, run_id: &RunId, stream: &str, index: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(run_id.0.as_bytes());
        hasher.update(stream.as_bytes());
        hasher.update(&index.to_le_bytes());
        let hash = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(head)
    }

    pub fn rng_for(&self, run_id: &RunId, stream: &str, index: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(run_id, stream, index))
    }
}
