//! Injectable random source.
//!
//! Fingerprint sampling, throttle delays, and retry backoff all draw from a
//! [`SharedRng`] so tests can pin the sequence with a seed.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Cloneable handle to a seedable RNG shared by the fetch components.
#[derive(Debug, Clone)]
pub struct SharedRng {
    inner: Arc<Mutex<StdRng>>,
}

impl SharedRng {
    pub fn from_entropy() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            inner: Arc::new(Mutex::new(rng)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StdRng> {
        // A panic while sampling leaves the generator in a usable state.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Uniform integer in the inclusive range.
    pub fn range_u64(&self, range: RangeInclusive<u64>) -> u64 {
        self.lock().gen_range(range)
    }

    /// Uniform duration between `min` and `max` at millisecond granularity.
    pub fn duration_between(&self, min: Duration, max: Duration) -> Duration {
        let lo = u64::try_from(min.as_millis()).unwrap_or(u64::MAX);
        let hi = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        if hi <= lo {
            return min;
        }
        Duration::from_millis(self.range_u64(lo..=hi))
    }

    pub fn choose<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut *self.lock())
    }
}

impl Default for SharedRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}
