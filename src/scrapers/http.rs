//! Plain HTTP page source. Does not run JavaScript.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use tracing::{debug, warn};

use super::fetcher::{FetchError, FetcherLauncher, HtmlPageFetcher, HtmlSource, PageFetcher};

pub const USER_AGENT: &str = "safecase/0.1 (enforcement case research)";

/// Real browser user agents for impersonate mode.
pub const IMPERSONATE_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
];

/// Resolve the configured user agent.
/// - None => default safecase user agent
/// - "impersonate" => random real browser user agent
/// - other => used as given
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config {
        None => USER_AGENT.to_string(),
        Some("impersonate") => {
            let idx = rand::rng().random_range(0..IMPERSONATE_USER_AGENTS.len());
            IMPERSONATE_USER_AGENTS[idx].to_string()
        }
        Some(custom) => custom.to_string(),
    }
}

/// Fetches raw HTML with reqwest.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: Option<&str>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(resolve_user_agent(user_agent))
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .cookie_store(true)
            .build()
            .map_err(|e| FetchError::Launch(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HtmlSource for HttpFetcher {
    async fn get_html(&mut self, url: &str) -> Result<String, FetchError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("HTTP {} from {}", status.as_u16(), url);
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    async fn close(&mut self) {}
}

/// Launches an [`HttpFetcher`] per crawl.
#[derive(Debug, Clone)]
pub struct HttpLauncher {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

#[async_trait]
impl FetcherLauncher for HttpLauncher {
    async fn launch(&self) -> Result<Box<dyn PageFetcher>, FetchError> {
        let source = HttpFetcher::new(self.timeout, self.user_agent.as_deref())?;
        Ok(Box::new(HtmlPageFetcher::new(source)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_user_agent() {
        assert_eq!(resolve_user_agent(None), USER_AGENT);
        assert_eq!(resolve_user_agent(Some("custom/1.0")), "custom/1.0");
        let ua = resolve_user_agent(Some("impersonate"));
        assert!(IMPERSONATE_USER_AGENTS.contains(&ua.as_str()));
    }

    #[tokio::test]
    async fn test_launch_builds_fetcher() {
        let launcher = HttpLauncher {
            timeout: Duration::from_secs(5),
            user_agent: None,
        };
        let mut fetcher = launcher.launch().await.unwrap();
        fetcher.close().await;
    }
}
