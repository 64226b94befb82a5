//! Injectable randomness source.
//!
//! Retry jitter and the `random` fallback strategy both need a source of
//! randomness. Per spec.md §9 Design Notes, that source is injectable with
//! a documented default, so tests can make both deterministic.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Abstract randomness source used by the retry manager and fallback
/// orchestrator.
pub trait Prng: Send + Sync {
    /// Returns a uniform random `f64` in `[0, 1)`.
    fn next_f64(&self) -> f64;

    /// Returns a uniform random `u64`.
    fn next_u64(&self) -> u64;

    /// Fisher-Yates shuffle, in place.
    fn shuffle<T>(&self, items: &mut [T]) {
        if items.len() < 2 {
            return;
        }
        for i in (1..items.len()).rev() {
            let j = (self.next_u64() as usize) % (i + 1);
            items.swap(i, j);
        }
    }
}

/// Default PRNG: a `ChaCha20` generator seeded from OS entropy, or from a
/// fixed seed for reproducible tests/simulations.
pub struct DefaultPrng {
    inner: Mutex<ChaCha20Rng>,
}

impl DefaultPrng {
    /// Seeds from OS entropy. This is the production default.
    pub fn from_entropy() -> Self {
        Self {
            inner: Mutex::new(ChaCha20Rng::from_entropy()),
        }
    }

    /// Seeds deterministically, for reproducible tests and simulations.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
        }
    }
}

impl Default for DefaultPrng {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl Prng for DefaultPrng {
    fn next_f64(&self) -> f64 {
        let mut guard = self.inner.lock();
        // 53 bits of randomness, matching f64's mantissa, mapped to [0, 1).
        let upper = (guard.next_u64() >> 11) as f64;
        upper / (1u64 << 53) as f64
    }

    fn next_u64(&self) -> u64 {
        self.inner.lock().next_u64()
    }
}

/// Shared, dynamically dispatched PRNG handle.
pub type SharedPrng = Arc<dyn Prng>;

/// Convenience constructor for the default entropy-seeded `SharedPrng`.
pub fn default_prng() -> SharedPrng {
    Arc::new(DefaultPrng::from_entropy())
}
