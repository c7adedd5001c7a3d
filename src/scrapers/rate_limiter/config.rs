//! Rate limiter configuration.

use std::time::Duration;

use rand::Rng;

/// Politeness delay settings.
///
/// Every request is followed by a pause drawn uniformly from
/// `[min_delay, max_delay]`, multiplied by the current backoff factor.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Factor applied to the backoff on each failed request.
    pub backoff_multiplier: f64,
    /// Upper bound on any single pause.
    pub max_backoff: Duration,
    /// Consecutive successes before the backoff is reduced.
    pub recovery_threshold: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(20),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(300),
            recovery_threshold: 3,
        }
    }
}

impl RateLimitConfig {
    /// No delay at all.
    pub fn immediate() -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_backoff: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Window from milliseconds, swapping the bounds if given in reverse.
    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        let (lo, hi) = if min_ms <= max_ms {
            (min_ms, max_ms)
        } else {
            (max_ms, min_ms)
        };
        Self {
            min_delay: Duration::from_millis(lo),
            max_delay: Duration::from_millis(hi),
            max_backoff: Duration::from_millis(hi).max(Duration::from_secs(300)),
            ..Default::default()
        }
    }

    /// Draw one jittered base delay.
    pub fn sample_delay(&self) -> Duration {
        let lo = self.min_delay.as_millis() as u64;
        let hi = self.max_delay.as_millis() as u64;
        if hi <= lo {
            return self.min_delay;
        }
        Duration::from_millis(rand::rng().random_range(lo..=hi))
    }
}

/// Statistics for a domain.
#[derive(Debug, Clone)]
pub struct DomainStats {
    pub current_delay: Duration,
    pub backoff: f64,
    pub in_backoff: bool,
    pub total_requests: u64,
    pub failures: u64,
}
