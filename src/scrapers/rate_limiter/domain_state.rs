//! Per-domain rate limiting state.

use std::time::{Duration, Instant};

/// State for a single domain.
#[derive(Debug, Clone)]
pub struct DomainState {
    /// Pause required after the last request.
    pub current_delay: Duration,
    /// Last request time.
    pub last_request: Option<Instant>,
    /// Multiplier on the sampled delay; 1.0 when not backing off.
    pub backoff: f64,
    /// Consecutive successes since the last failure.
    pub consecutive_successes: u32,
    /// Whether currently in backoff.
    pub in_backoff: bool,
    /// Total requests made.
    pub total_requests: u64,
    /// Total failed requests.
    pub failures: u64,
}

impl DomainState {
    pub fn new() -> Self {
        Self {
            current_delay: Duration::ZERO,
            last_request: None,
            backoff: 1.0,
            consecutive_successes: 0,
            in_backoff: false,
            total_requests: 0,
            failures: 0,
        }
    }

    /// Time until this domain is ready for another request.
    pub fn time_until_ready(&self) -> Duration {
        match self.last_request {
            Some(last) => self.current_delay.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }
}

impl Default for DomainState {
    fn default() -> Self {
        Self::new()
    }
}
