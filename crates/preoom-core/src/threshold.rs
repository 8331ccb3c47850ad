//! Threshold policy
//!
//! Turns the cgroup hard limit and a configured percentage into the
//! supervisor's soft threshold, and decides whether a usage sample
//! breaches it. Everything here is pure and allocation-free.

/// Limits derived once after cgroup discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLimits {
    /// The cgroup's configured ceiling in bytes
    pub hard_limit_bytes: i64,
    /// Supervisor trigger point, `round(hard * percent / 100)`
    pub soft_threshold_bytes: i64,
}

impl MemoryLimits {
    /// Derive limits for a known hard limit.
    pub fn new(hard_limit_bytes: i64, percent: f64) -> Self {
        Self {
            hard_limit_bytes,
            soft_threshold_bytes: compute_threshold(hard_limit_bytes, percent),
        }
    }

    /// Check a usage sample against the soft threshold
    #[inline]
    pub fn is_breached_by(&self, sample: i64) -> bool {
        is_over(sample, self.soft_threshold_bytes)
    }
}

/// Compute the soft threshold for `hard_limit` at `percent` of it.
///
/// Rounds to nearest (ties away from zero) and clamps into
/// `[1, hard_limit]` for positive limits.
pub fn compute_threshold(hard_limit: i64, percent: f64) -> i64 {
    let soft = (hard_limit as f64 / 100.0 * percent).round() as i64;
    if hard_limit <= 0 {
        return soft;
    }
    soft.clamp(1, hard_limit)
}

/// True when `sample` is strictly above `threshold`.
///
/// Equality is not a breach.
#[inline]
pub fn is_over(sample: i64, threshold: i64) -> bool {
    sample > threshold
}
