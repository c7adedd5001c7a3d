//! Per-region update loops.

use std::ops::RangeInclusive;
use std::sync::Arc;

use indicatif::ProgressBar;
use serde::Serialize;
use tracing::info;

use super::checkpoint::CheckpointPolicy;
use super::{reconcile_details, reconcile_summary, select_pending, PipelineError};
use crate::models::Region;
use crate::scrapers::{FetcherLauncher, RateLimiter};
use crate::store::Store;

/// Crawl parameters that do not change within a run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Listing URL with `{page}` and `{site}` placeholders.
    pub listing_url: String,
    pub summary_checkpoint: CheckpointPolicy,
    pub detail_checkpoint: CheckpointPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            listing_url: crate::config::DEFAULT_LISTING_URL.to_string(),
            summary_checkpoint: CheckpointPolicy::new(2),
            detail_checkpoint: CheckpointPolicy::new(10),
        }
    }
}

/// Everything a crawl needs: where to store, how to fetch, how fast.
pub struct Pipeline {
    pub(crate) store: Store,
    pub(crate) launcher: Arc<dyn FetcherLauncher>,
    pub(crate) limiter: RateLimiter,
    pub(crate) settings: PipelineSettings,
    pub(crate) progress: Option<ProgressBar>,
}

/// Outcome of one page-range pass of a list update.
#[derive(Debug, Clone, Serialize)]
pub struct ListPass {
    pub first_page: u32,
    pub last_page: u32,
    /// Distinct links listed in the range.
    pub fetched: usize,
    /// Links not previously stored, now persisted.
    pub new: usize,
    pub failed_urls: Vec<String>,
}

/// Outcome of updating one region's case list.
#[derive(Debug, Clone, Serialize)]
pub struct ListUpdate {
    pub region: Region,
    pub passes: Vec<ListPass>,
}

impl ListUpdate {
    pub fn new_count(&self) -> usize {
        self.passes.iter().map(|p| p.new).sum()
    }

    pub fn failed_urls(&self) -> impl Iterator<Item = &str> {
        self.passes
            .iter()
            .flat_map(|p| p.failed_urls.iter().map(String::as_str))
    }
}

/// Outcome of updating one region's case details.
#[derive(Debug, Clone, Serialize)]
pub struct DetailUpdate {
    pub region: Region,
    pub pending: usize,
    pub fetched: usize,
    pub saved: usize,
    pub failed_urls: Vec<String>,
}

/// Whether a pass that listed `fetched` links, `new` of them unseen, should
/// be followed by the next page range.
pub fn should_continue(fetched: usize, new: usize) -> bool {
    fetched > 0 && new == fetched
}

impl Pipeline {
    pub fn new(
        store: Store,
        launcher: Arc<dyn FetcherLauncher>,
        limiter: RateLimiter,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            launcher,
            limiter,
            settings,
            progress: None,
        }
    }

    /// Report detail crawl progress on `pb`.
    pub fn with_progress(mut self, pb: ProgressBar) -> Self {
        self.progress = Some(pb);
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Crawl and reconcile one region's listing, starting at `pages`.
    ///
    /// As long as every listed link in a pass turns out to be new, the
    /// window has not reached already-stored history yet, so the next page
    /// (`last + 1`) is crawled as another pass.
    pub async fn update_case_list(
        &self,
        region: Region,
        pages: RangeInclusive<u32>,
    ) -> Result<ListUpdate, PipelineError> {
        let mut update = ListUpdate {
            region,
            passes: Vec::new(),
        };
        let (mut first, mut last) = (*pages.start(), *pages.end());

        loop {
            let crawl = self.crawl_summary(region, first..=last).await?;
            let fetched = {
                let mut links: Vec<&str> = crawl.records.iter().map(|r| r.link.as_str()).collect();
                links.sort_unstable();
                links.dedup();
                links.len()
            };
            let new = reconcile_summary(&self.store, region, &crawl.records)?;
            info!(
                region = region.code(),
                "Pages {}-{}: {} listed, {} new",
                first,
                last,
                fetched,
                new.len()
            );

            let keep_going = should_continue(fetched, new.len());
            update.passes.push(ListPass {
                first_page: first,
                last_page: last,
                fetched,
                new: new.len(),
                failed_urls: crawl.failed_urls,
            });

            if !keep_going {
                break;
            }
            first = last + 1;
            last += 1;
        }

        Ok(update)
    }

    /// Recompute the pending set for `region`, crawl it and persist the results.
    pub async fn update_case_details(&self, region: Region) -> Result<DetailUpdate, PipelineError> {
        let pending = select_pending(&self.store, region)?;
        let mut update = DetailUpdate {
            region,
            pending: pending.len(),
            fetched: 0,
            saved: 0,
            failed_urls: Vec::new(),
        };
        if pending.is_empty() {
            info!(region = region.code(), "No cases pending detail");
            return Ok(update);
        }

        let crawl = self.crawl_details(region, &pending).await?;
        update.fetched = crawl.records.len();
        update.failed_urls = crawl.failed_urls;
        update.saved = reconcile_details(&self.store, region, crawl.records)?.len();
        Ok(update)
    }

    /// Run [`Self::update_case_list`] for each region in turn.
    ///
    /// A failure for one region is returned in its slot; later regions still run.
    pub async fn update_lists(
        &self,
        regions: &[Region],
        pages: RangeInclusive<u32>,
    ) -> Vec<(Region, Result<ListUpdate, PipelineError>)> {
        let mut results = Vec::with_capacity(regions.len());
        for &region in regions {
            let result = self.update_case_list(region, pages.clone()).await;
            results.push((region, result));
        }
        results
    }

    /// Run [`Self::update_case_details`] for each region in turn.
    pub async fn update_details(
        &self,
        regions: &[Region],
    ) -> Vec<(Region, Result<DetailUpdate, PipelineError>)> {
        let mut results = Vec::with_capacity(regions.len());
        for &region in regions {
            let result = self.update_case_details(region).await;
            results.push((region, result));
        }
        results
    }
}
