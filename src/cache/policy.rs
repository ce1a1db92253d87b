//! Expiration Policy Module
//!
//! Probabilistic early expiration (XFetch). As an entry approaches its hard
//! expiry, each read has a growing chance of being treated as a miss so that
//! recomputation is spread over time instead of every caller missing at once.
//!
//! A read at `now` is an early miss when
//!
//! ```text
//! now + compute_ms * beta * -ln(sample) >= expires_at
//! ```
//!
//! with `sample` drawn uniformly from `(0, 1]` on every call.

use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};

// == Beta ==
/// Early recomputation aggressiveness.
///
/// `0` disables early recomputation, larger values make it more likely,
/// and [`Beta::IMMEDIATE`] treats every read as a miss.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Beta(f64);

impl Beta {
    /// Entries are used until they hard-expire.
    pub const DISABLED: Beta = Beta(0.0);
    /// Recommended balance between stampede protection and freshness.
    pub const DEFAULT: Beta = Beta(1.0);
    /// Every read is a miss.
    pub const IMMEDIATE: Beta = Beta(f64::INFINITY);

    /// Creates a beta, rejecting negative values and NaN.
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value < 0.0 {
            return Err(CacheError::InvalidBeta(value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for Beta {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Source of uniform samples in `(0, 1]`.
pub type Sampler = fn() -> f64;

// == Expiration Policy ==
/// Decides whether a read should be treated as a miss.
#[derive(Debug, Clone, Copy)]
pub struct ExpirationPolicy {
    sampler: Sampler,
}

impl ExpirationPolicy {
    /// Creates a policy drawing from the thread-local RNG.
    pub fn new() -> Self {
        Self {
            sampler: uniform_sample,
        }
    }

    /// Creates a policy with a custom sample source.
    ///
    /// Samples outside `(0, 1]` are clamped to `1.0`, which never triggers an
    /// early miss.
    pub fn with_sampler(sampler: Sampler) -> Self {
        Self { sampler }
    }

    // == Should Treat As Miss ==
    /// Returns true if the read at `now_ms` must recompute.
    ///
    /// Absent and hard-expired entries always miss. Entries that never expire
    /// always hit, whatever the beta.
    pub fn should_treat_as_miss(
        &self,
        entry: Option<&CacheEntry>,
        now_ms: u64,
        beta: Beta,
    ) -> bool {
        let Some(entry) = entry else {
            return true;
        };
        let Some(expires_at) = entry.expires_at else {
            return false;
        };
        if now_ms >= expires_at || expires_at <= entry.created_at {
            return true;
        }
        if beta.0 == 0.0 {
            return false;
        }
        if beta.0.is_infinite() {
            return true;
        }

        let sample = (self.sampler)();
        let sample = if sample > 0.0 && sample <= 1.0 {
            sample
        } else {
            1.0
        };
        let delta = entry.compute_ms as f64 * beta.0 * -sample.ln();

        now_ms as f64 + delta >= expires_at as f64
    }
}

impl Default for ExpirationPolicy {
    fn default() -> Self {
        Self::new()
    }
}

fn uniform_sample() -> f64 {
    // random() is in [0, 1)
    1.0 - rand::random::<f64>()
}
