//! Detail crawler and reconciler.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::checkpoint;
use super::{dedup_by_key, load_complete_details, Pipeline};
use crate::models::{timestamp_now, DetailRecord, Region, SummaryRecord};
use crate::scrapers::{FetchError, PageFetcher};
use crate::store::{Store, StoreError, DETAIL_PREFIX};

/// Raw result of visiting a set of detail pages.
#[derive(Debug, Clone, Default)]
pub struct DetailCrawl {
    pub records: Vec<DetailRecord>,
    pub failed_urls: Vec<String>,
}

async fn fetch_record(
    fetcher: &mut dyn PageFetcher,
    pending: &SummaryRecord,
    region: Region,
) -> Result<DetailRecord, FetchError> {
    let pairs = fetcher.fetch_detail(&pending.link).await?.into_pairs()?;
    DetailRecord::new(pending.link.as_str(), pending.raw_date.as_str(), region, pairs)
        .map_err(|e| FetchError::Unsupported(e.to_string()))
}

impl Pipeline {
    /// Visit each pending link in order and build its detail record.
    ///
    /// The fetcher is launched here and closed before returning. A failed or
    /// misaligned row is logged, recorded in `failed_urls` and skipped; only a
    /// launch failure is returned as an error.
    pub async fn crawl_details(
        &self,
        region: Region,
        pending: &[SummaryRecord],
    ) -> Result<DetailCrawl, FetchError> {
        let mut fetcher = self.launcher.launch().await?;
        let crawl = self.walk_details(fetcher.as_mut(), region, pending).await;
        fetcher.close().await;
        Ok(crawl)
    }

    async fn walk_details(
        &self,
        fetcher: &mut dyn PageFetcher,
        region: Region,
        pending: &[SummaryRecord],
    ) -> DetailCrawl {
        let mut crawl = DetailCrawl::default();
        if let Some(pb) = &self.progress {
            pb.set_length(pending.len() as u64);
            pb.set_position(0);
        }

        for (idx, item) in pending.iter().enumerate() {
            debug!(region = region.code(), "Fetching detail {}", item.link);

            let domain = self.limiter.acquire(&item.link).await;
            match fetch_record(fetcher, item, region).await {
                Ok(record) => {
                    self.limiter.report_success(&domain).await;
                    crawl.records.push(record);
                }
                Err(e) => {
                    self.limiter.report_failure(&domain).await;
                    warn!(region = region.code(), "Detail page {} failed: {}", item.link, e);
                    crawl.failed_urls.push(item.link.clone());
                }
            }
            if let Some(pb) = &self.progress {
                pb.inc(1);
            }

            let processed = idx + 1;
            if self.settings.detail_checkpoint.is_due(processed) {
                checkpoint::save(
                    &self.store,
                    &DetailRecord::to_table(&crawl.records),
                    region.code(),
                    &format!("tempdtl-{}{}", region.code(), processed),
                );
            }
        }

        if !crawl.failed_urls.is_empty() {
            warn!(
                region = region.code(),
                "{} detail page(s) failed",
                crawl.failed_urls.len()
            );
        }
        crawl
    }
}

/// Persist detail records whose link has no complete stored detail yet.
///
/// Links already detailed (with a narrative) for `region` and repeats within
/// `batch` are dropped, so re-running on a stale pending snapshot never
/// creates duplicates. The persisted batch is also copied to the checkpoint
/// area. Returns the records that were written.
pub fn reconcile_details(
    store: &Store,
    region: Region,
    batch: Vec<DetailRecord>,
) -> Result<Vec<DetailRecord>, StoreError> {
    if batch.is_empty() {
        return Ok(batch);
    }

    let known: HashSet<String> = load_complete_details(store, Some(region))?
        .into_iter()
        .map(|r| r.link().to_string())
        .collect();

    let total = batch.len();
    let fresh: Vec<DetailRecord> = batch
        .into_iter()
        .filter(|r| !known.contains(r.link()))
        .collect();
    let fresh = dedup_by_key(fresh, |r| r.link().to_string());
    if fresh.len() < total {
        info!(
            region = region.code(),
            "Dropped {} already-detailed record(s)",
            total - fresh.len()
        );
    }
    if fresh.is_empty() {
        return Ok(fresh);
    }

    let table = DetailRecord::to_table(&fresh);
    let name = format!("{}{}{}", DETAIL_PREFIX, region.code(), timestamp_now());
    checkpoint::save(store, &table, region.code(), &name);
    store.append(&table, &name)?;
    info!(region = region.code(), "Saved {} detail record(s)", fresh.len());
    Ok(fresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fields;

    fn detail(link: &str, narrative: &str) -> DetailRecord {
        let mut pairs = vec![(fields::SUBJECT_NAME.to_string(), "甲".to_string())];
        if !narrative.is_empty() {
            pairs.push((fields::VIOLATION_FACTS.to_string(), narrative.to_string()));
        }
        DetailRecord::new(link, "2024/01/01", Region::Fujian, pairs).unwrap()
    }

    #[test]
    fn test_reconcile_drops_known_and_repeated_links() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("safe"), dir.path().join("temp"));

        let saved = reconcile_details(
            &store,
            Region::Fujian,
            vec![detail("a", "事实"), detail("b", "事实"), detail("a", "事实")],
        )
        .unwrap();
        assert_eq!(saved.len(), 2);

        let again = reconcile_details(&store, Region::Fujian, vec![detail("a", "事实")]).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_reconcile_retries_records_without_narrative() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("safe"), dir.path().join("temp"));

        reconcile_details(&store, Region::Fujian, vec![detail("a", "")]).unwrap();
        let retried = reconcile_details(&store, Region::Fujian, vec![detail("a", "事实")]).unwrap();
        assert_eq!(retried.len(), 1);
    }

    #[test]
    fn test_reconcile_writes_checkpoint_copy() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("safe"), dir.path().join("temp"));
        reconcile_details(&store, Region::Fujian, vec![detail("a", "事实")]).unwrap();

        let copies = std::fs::read_dir(dir.path().join("temp").join("fujian"))
            .unwrap()
            .count();
        assert_eq!(copies, 1);
    }
}
