//! Headless browser page source for JavaScript-rendered listing sites.
//!
//! Uses chromiumoxide (CDP). The browser process lives for exactly one crawl:
//! it is started by [`BrowserLauncher::launch`] and shut down by `close()`,
//! or killed on drop if the crawl never got that far.

mod config;

pub use config::BrowserEngineConfig;

use async_trait::async_trait;

use super::fetcher::{FetchError, FetcherLauncher, PageFetcher};
#[cfg(feature = "browser")]
use super::fetcher::{HtmlPageFetcher, HtmlSource};

#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

/// Browser-backed HTML source.
#[cfg(feature = "browser")]
pub struct BrowserFetcher {
    config: BrowserEngineConfig,
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    remote: bool,
}

#[cfg(feature = "browser")]
impl BrowserFetcher {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    pub fn new(config: BrowserEngineConfig) -> Self {
        Self {
            config,
            browser: None,
            handler: None,
            remote: false,
        }
    }

    fn find_chrome() -> Option<std::path::PathBuf> {
        Self::CHROME_PATHS
            .iter()
            .map(std::path::Path::new)
            .find(|p| p.exists())
            .map(|p| p.to_path_buf())
    }

    fn spawn_handler(&mut self, mut handler: chromiumoxide::Handler) {
        self.handler = Some(tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        }));
    }

    /// Launch or connect to the browser if not already running.
    pub async fn ensure_browser(&mut self) -> Result<(), FetchError> {
        if self.browser.is_some() {
            return Ok(());
        }

        if let Some(remote_url) = self.config.remote_url.clone() {
            return self.connect_remote(&remote_url).await;
        }

        info!("Launching browser (headless={})", self.config.headless);

        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_secs(self.config.timeout));
        if let Some(path) = Self::find_chrome() {
            debug!("Found Chrome at: {}", path.display());
            builder = builder.chrome_executable(path);
        }

        // with_head means NOT headless
        if !self.config.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = self.config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu");

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| FetchError::Launch(format!("Failed to build browser config: {}", e)))?;

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::Launch(format!("Failed to launch browser: {}", e)))?;

        self.spawn_handler(handler);
        self.browser = Some(browser);
        self.remote = false;
        Ok(())
    }

    /// Connect to a remote Chrome instance.
    async fn connect_remote(&mut self, url: &str) -> Result<(), FetchError> {
        info!(
            "Connecting to remote browser at {} (timeout: {}s)",
            url, self.config.timeout
        );

        // Get WebSocket URL from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .map_err(|e| FetchError::Launch(format!("Failed to connect to remote browser: {}", e)))?
            .json()
            .await
            .map_err(|e| FetchError::Launch(format!("Failed to parse browser version info: {}", e)))?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| FetchError::Launch("No webSocketDebuggerUrl in response".to_string()))?;

        debug!("Connecting to WebSocket: {}", ws_url);

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: Duration::from_secs(self.config.timeout),
            ..Default::default()
        };

        let (browser, handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| FetchError::Launch(format!("Failed to connect to remote browser: {}", e)))?;

        self.spawn_handler(handler);
        self.browser = Some(browser);
        self.remote = true;
        Ok(())
    }

    async fn render(&mut self, url: &str) -> Result<String, FetchError> {
        let nav_err = |reason: String| FetchError::Navigation {
            url: url.to_string(),
            reason,
        };

        self.ensure_browser().await?;
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| FetchError::Launch("browser not running".to_string()))?;

        let timeout = Duration::from_secs(self.config.timeout);
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| nav_err(e.to_string()))?;

        debug!("Navigating to {}", url);
        let navigated = match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(nav_err(e.to_string())),
            Err(_) => Err(nav_err("timed out".to_string())),
        };

        let content = match navigated {
            Ok(()) => {
                if let Some(ref selector) = self.config.wait_for_selector {
                    match tokio::time::timeout(timeout, page.find_element(selector.as_str())).await {
                        Ok(Ok(_)) => debug!("Selector found"),
                        Ok(Err(e)) => debug!("Selector {} not found: {}", selector, e),
                        Err(_) => warn!("Timeout waiting for selector {}", selector),
                    }
                }
                page.content().await.map_err(|e| nav_err(e.to_string()))
            }
            Err(e) => Err(e),
        };

        // Close the page to prevent tab accumulation
        let _ = page.close().await;
        content
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl HtmlSource for BrowserFetcher {
    async fn get_html(&mut self, url: &str) -> Result<String, FetchError> {
        self.render(url).await
    }

    /// Quit a launched browser, or just disconnect from a remote one.
    async fn close(&mut self) {
        if let Some(mut browser) = self.browser.take() {
            if !self.remote {
                if let Err(e) = browser.close().await {
                    warn!("Failed to close browser: {}", e);
                }
                let _ = browser.wait().await;
            }
            info!("Browser closed");
        }
        if let Some(task) = self.handler.take() {
            task.abort();
        }
    }
}

#[cfg(feature = "browser")]
impl Drop for BrowserFetcher {
    fn drop(&mut self) {
        // chromiumoxide kills a launched child process when the Browser drops.
        if let Some(task) = self.handler.take() {
            task.abort();
        }
    }
}

/// Starts a browser per crawl.
#[derive(Debug, Clone, Default)]
pub struct BrowserLauncher {
    pub config: BrowserEngineConfig,
}

#[cfg(feature = "browser")]
#[async_trait]
impl FetcherLauncher for BrowserLauncher {
    async fn launch(&self) -> Result<Box<dyn PageFetcher>, FetchError> {
        let mut source = BrowserFetcher::new(self.config.clone());
        source.ensure_browser().await?;
        Ok(Box::new(HtmlPageFetcher::new(source)))
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
#[async_trait]
impl FetcherLauncher for BrowserLauncher {
    async fn launch(&self) -> Result<Box<dyn PageFetcher>, FetchError> {
        Err(FetchError::Launch(
            "Browser support not compiled. Rebuild with: cargo build --features browser, or set fetcher = \"http\"".to_string(),
        ))
    }
}
