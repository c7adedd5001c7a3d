//! Page fetchers and politeness control for the listing sites.

pub mod browser;
pub mod extract;
pub mod fetcher;
pub mod http;
pub mod rate_limiter;

#[cfg(feature = "browser")]
pub use browser::BrowserFetcher;
pub use browser::{BrowserEngineConfig, BrowserLauncher};
pub use fetcher::{
    DetailCells, FetchError, FetcherLauncher, HtmlPageFetcher, HtmlSource, PageFetcher,
};
pub use http::{HttpFetcher, HttpLauncher};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
