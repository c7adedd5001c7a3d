//! Incremental crawl-and-reconcile pipeline.
//!
//! Per region: crawl listing pages, keep only links not already stored,
//! derive the pending-detail set, crawl those detail pages and persist the
//! results. Nothing here aborts on a single bad page or row; only failing to
//! start the page fetcher or failing to persist a reconciled batch does.

pub mod checkpoint;
pub mod detail;
pub mod orchestrator;
pub mod pending;
pub mod summary;

use std::collections::HashSet;

use thiserror::Error;

use crate::models::{DetailRecord, Region, SummaryRecord};
use crate::scrapers::FetchError;
use crate::store::{Store, StoreError, DETAIL_PREFIX, SUMMARY_PREFIX};

pub use checkpoint::CheckpointPolicy;
pub use detail::{reconcile_details, DetailCrawl};
pub use orchestrator::{should_continue, DetailUpdate, ListPass, ListUpdate, Pipeline, PipelineSettings};
pub use pending::{load_pending, pending_regions, select_pending, staleness, Staleness};
pub use summary::{listing_url, reconcile_summary, SummaryCrawl};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Every stored summary record, optionally restricted to one region.
pub fn load_summaries(store: &Store, region: Option<Region>) -> Result<Vec<SummaryRecord>, StoreError> {
    let records = SummaryRecord::from_table(&store.load(SUMMARY_PREFIX)?);
    Ok(match region {
        Some(region) => records.into_iter().filter(|r| r.region == region).collect(),
        None => records,
    })
}

/// Every stored detail record, optionally restricted to one region.
pub fn load_details(store: &Store, region: Option<Region>) -> Result<Vec<DetailRecord>, StoreError> {
    let records = DetailRecord::from_table(&store.load(DETAIL_PREFIX)?);
    Ok(match region {
        Some(region) => records.into_iter().filter(|r| r.region() == region).collect(),
        None => records,
    })
}

/// Stored detail records that carry a narrative. Rows without one count as
/// not yet fetched.
pub fn load_complete_details(
    store: &Store,
    region: Option<Region>,
) -> Result<Vec<DetailRecord>, StoreError> {
    Ok(load_details(store, region)?
        .into_iter()
        .filter(DetailRecord::has_narrative)
        .collect())
}

/// Keep the first record for each key, preserving order.
pub(crate) fn dedup_by_key<T, F>(records: Vec<T>, mut key: F) -> Vec<T>
where
    F: FnMut(&T) -> String,
{
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(key(r)))
        .collect()
}
