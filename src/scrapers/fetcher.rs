//! Page fetcher collaborator contract.
//!
//! The pipeline never talks to a browser or HTTP client directly. It asks a
//! [`FetcherLauncher`] for a [`PageFetcher`] at the start of a crawl, pulls
//! text cells, anchors and header/value pairs out of it, and closes it at the
//! end of the crawl whether or not individual pages failed.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use super::extract;

/// Errors from fetching or extracting a single page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The fetcher could not be started. This is the only error that aborts a crawl.
    #[error("Failed to start page fetcher: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Listing has {cells} cells but {links} links")]
    MisalignedListing { cells: usize, links: usize },

    #[error("Detail page has {headers} headers but {values} values")]
    MisalignedDetail { headers: usize, values: usize },

    #[error("{0}")]
    Unsupported(String),
}

/// Header and value cells from a detail page, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailCells {
    pub headers: Vec<String>,
    pub values: Vec<String>,
}

impl DetailCells {
    /// Zip headers with values. Fails when the counts differ.
    pub fn into_pairs(self) -> Result<Vec<(String, String)>, FetchError> {
        if self.headers.len() != self.values.len() {
            return Err(FetchError::MisalignedDetail {
                headers: self.headers.len(),
                values: self.values.len(),
            });
        }
        Ok(self.headers.into_iter().zip(self.values).collect())
    }
}

/// A live page source for one crawl invocation.
#[async_trait]
pub trait PageFetcher: Send {
    /// Text of every table cell on a listing page, in document order.
    async fn fetch_listing(&mut self, url: &str) -> Result<Vec<String>, FetchError>;

    /// Absolute hrefs of every anchor in the listing table, in document order.
    async fn fetch_anchors(&mut self, url: &str) -> Result<Vec<String>, FetchError>;

    /// Header and value cells of a case detail page.
    async fn fetch_detail(&mut self, url: &str) -> Result<DetailCells, FetchError>;

    /// Release the underlying resource. Called exactly once per crawl.
    async fn close(&mut self);
}

/// Acquires a fresh [`PageFetcher`] for each crawl.
#[async_trait]
pub trait FetcherLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PageFetcher>, FetchError>;
}

/// Anything that can return the HTML of a page.
#[async_trait]
pub trait HtmlSource: Send {
    async fn get_html(&mut self, url: &str) -> Result<String, FetchError>;

    async fn close(&mut self);
}

/// [`PageFetcher`] over an [`HtmlSource`].
///
/// Listing cells and anchors come from the same page, so the last page is
/// cached and a second call for the same URL does not refetch it.
pub struct HtmlPageFetcher<S> {
    source: S,
    last_page: Option<(String, String)>,
}

impl<S: HtmlSource> HtmlPageFetcher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            last_page: None,
        }
    }

    async fn html(&mut self, url: &str) -> Result<String, FetchError> {
        if let Some((cached_url, html)) = &self.last_page {
            if cached_url == url {
                debug!("Page cache hit: {}", url);
                return Ok(html.clone());
            }
        }
        let html = self.source.get_html(url).await?;
        self.last_page = Some((url.to_string(), html.clone()));
        Ok(html)
    }
}

#[async_trait]
impl<S: HtmlSource> PageFetcher for HtmlPageFetcher<S> {
    async fn fetch_listing(&mut self, url: &str) -> Result<Vec<String>, FetchError> {
        let html = self.html(url).await?;
        extract::listing_cells(&html)
    }

    async fn fetch_anchors(&mut self, url: &str) -> Result<Vec<String>, FetchError> {
        let html = self.html(url).await?;
        extract::listing_anchors(&html, url)
    }

    async fn fetch_detail(&mut self, url: &str) -> Result<DetailCells, FetchError> {
        let html = self.html(url).await?;
        extract::detail_cells(&html)
    }

    async fn close(&mut self) {
        self.last_page = None;
        self.source.close().await;
    }
}
