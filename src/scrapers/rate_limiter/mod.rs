//! Jittered per-domain rate limiter.
//!
//! Enforces a random politeness pause between consecutive requests to the
//! same host. Failures multiply the pause; a run of successes brings it back.

mod config;
mod domain_state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

pub use config::{DomainStats, RateLimitConfig};
use domain_state::DomainState;

/// Ceiling on the backoff factor; `max_backoff` caps the pause itself.
const MAX_BACKOFF_FACTOR: f64 = 64.0;

/// Rate limiter shared by every crawl in a run.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    pub(crate) config: RateLimitConfig,
    pub(crate) domains: Arc<RwLock<HashMap<String, DomainState>>>,
}

impl RateLimiter {
    /// Create a new rate limiter with default config.
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    /// Create a new rate limiter with custom config.
    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            config,
            domains: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// A limiter that never waits.
    pub fn immediate() -> Self {
        Self::with_config(RateLimitConfig::immediate())
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Extract the host from a URL. Anything unparsable shares one bucket.
    pub fn extract_domain(url: &str) -> String {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|s| s.to_string()))
            .unwrap_or_default()
    }

    /// Wait until the domain is ready, then mark a request as started.
    ///
    /// Returns the domain key to pass to `report_success` / `report_failure`.
    pub async fn acquire(&self, url: &str) -> String {
        let domain = Self::extract_domain(url);

        let wait_time = {
            let domains = self.domains.read().await;
            domains
                .get(&domain)
                .map(|s| s.time_until_ready())
                .unwrap_or(Duration::ZERO)
        };

        if wait_time > Duration::ZERO {
            debug!("Rate limiting {}: waiting {:?}", domain, wait_time);
            tokio::time::sleep(wait_time).await;
        }

        {
            let mut domains = self.domains.write().await;
            let state = domains.entry(domain.clone()).or_default();
            let delay = self.config.sample_delay().mul_f64(state.backoff);
            state.current_delay = delay.min(self.config.max_backoff.max(self.config.max_delay));
            state.last_request = Some(Instant::now());
            state.total_requests += 1;
        }

        domain
    }

    /// Report a successful request. May end a backoff.
    pub async fn report_success(&self, domain: &str) {
        let mut domains = self.domains.write().await;
        if let Some(state) = domains.get_mut(domain) {
            state.consecutive_successes += 1;

            if state.in_backoff && state.consecutive_successes >= self.config.recovery_threshold {
                state.backoff = (state.backoff / self.config.backoff_multiplier).max(1.0);
                if state.backoff <= 1.0 {
                    state.in_backoff = false;
                    info!("Domain {} recovered from backoff", domain);
                } else {
                    debug!("Domain {} backoff reduced to {:.1}x", domain, state.backoff);
                }
                state.consecutive_successes = 0;
            }
        }
    }

    /// Report a failed request. Increases the pause for this domain.
    pub async fn report_failure(&self, domain: &str) {
        let mut domains = self.domains.write().await;
        if let Some(state) = domains.get_mut(domain) {
            state.failures += 1;
            state.consecutive_successes = 0;
            state.in_backoff = true;
            state.backoff = (state.backoff * self.config.backoff_multiplier).min(MAX_BACKOFF_FACTOR);

            // Stretch the pause that is already pending as well
            let stretched = state.current_delay.mul_f64(self.config.backoff_multiplier);
            state.current_delay = stretched.min(self.config.max_backoff.max(self.config.max_delay));

            warn!(
                "Request to {} failed, backing off to {:.1}x",
                domain, state.backoff
            );
        }
    }

    /// Get time until domain is ready.
    pub async fn time_until_ready(&self, url: &str) -> Duration {
        let domain = Self::extract_domain(url);
        let domains = self.domains.read().await;
        domains
            .get(&domain)
            .map(|s| s.time_until_ready())
            .unwrap_or(Duration::ZERO)
    }

    /// Get statistics for all domains.
    pub async fn get_stats(&self) -> HashMap<String, DomainStats> {
        let domains = self.domains.read().await;
        domains
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    DomainStats {
                        current_delay: v.current_delay,
                        backoff: v.backoff,
                        in_backoff: v.in_backoff,
                        total_requests: v.total_requests,
                        failures: v.failures,
                    },
                )
            })
            .collect()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            RateLimiter::extract_domain("http://www.safe.gov.cn/www/illegal/index?page=1"),
            "www.safe.gov.cn"
        );
        assert_eq!(RateLimiter::extract_domain("not a url"), "");
    }

    #[test]
    fn test_sample_delay_stays_in_window() {
        let config = RateLimitConfig::from_millis(20, 10);
        assert_eq!(config.min_delay, Duration::from_millis(10));
        for _ in 0..100 {
            let d = config.sample_delay();
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
    }

    #[tokio::test]
    async fn test_immediate_never_waits() {
        let limiter = RateLimiter::immediate();
        for _ in 0..3 {
            let domain = limiter.acquire("http://example.com/a").await;
            limiter.report_success(&domain).await;
        }
        assert_eq!(
            limiter.time_until_ready("http://example.com/b").await,
            Duration::ZERO
        );
        let stats = limiter.get_stats().await;
        assert_eq!(stats["example.com"].total_requests, 3);
    }

    #[tokio::test]
    async fn test_backoff_and_recovery() {
        let limiter = RateLimiter::with_config(RateLimitConfig {
            backoff_multiplier: 2.0,
            recovery_threshold: 2,
            ..RateLimitConfig::immediate()
        });

        let domain = limiter.acquire("http://example.com/1").await;
        limiter.report_failure(&domain).await;
        let stats = limiter.get_stats().await;
        assert!(stats["example.com"].in_backoff);
        assert_eq!(stats["example.com"].backoff, 2.0);

        limiter.report_success(&domain).await;
        limiter.report_success(&domain).await;
        let stats = limiter.get_stats().await;
        assert!(!stats["example.com"].in_backoff);
        assert_eq!(stats["example.com"].failures, 1);
    }
}
