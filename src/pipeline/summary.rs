//! Summary crawler and reconciler.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use tracing::{debug, info, warn};

use super::checkpoint;
use super::{dedup_by_key, load_summaries, Pipeline};
use crate::models::{timestamp_now, Region, SummaryRecord};
use crate::scrapers::{FetchError, PageFetcher};
use crate::store::{Store, StoreError, SUMMARY_PREFIX};

/// Cells per listing row: sequence number, subject name, date, document number.
const CELLS_PER_ROW: usize = 4;

/// Raw result of walking one page range.
#[derive(Debug, Clone, Default)]
pub struct SummaryCrawl {
    pub records: Vec<SummaryRecord>,
    pub failed_urls: Vec<String>,
}

/// Fill a listing URL template (`{page}`, `{site}`) for one region and page.
pub fn listing_url(template: &str, region: Region, page: u32) -> String {
    template
        .replace("{page}", &page.to_string())
        .replace("{site}", region.code())
}

/// Slice listing cells into records, pairing each row with its link.
fn parse_listing(
    cells: Vec<String>,
    links: Vec<String>,
    region: Region,
) -> Result<Vec<SummaryRecord>, FetchError> {
    let rows = cells.len() / CELLS_PER_ROW;
    if rows == 0 {
        return Ok(Vec::new());
    }
    if links.len() != rows {
        return Err(FetchError::MisalignedListing {
            cells: cells.len(),
            links: links.len(),
        });
    }

    let mut cells = cells.into_iter();
    let mut next = || cells.next().unwrap_or_default();
    Ok(links
        .into_iter()
        .map(|link| SummaryRecord {
            sequence_no: next(),
            subject_name: next(),
            raw_date: next(),
            document_no: next(),
            link,
            region,
        })
        .collect())
}

async fn fetch_page(
    fetcher: &mut dyn PageFetcher,
    url: &str,
    region: Region,
) -> Result<Vec<SummaryRecord>, FetchError> {
    let cells = fetcher.fetch_listing(url).await?;
    let links = fetcher.fetch_anchors(url).await?;
    parse_listing(cells, links, region)
}

impl Pipeline {
    /// Walk `pages` for one region and collect every listed record.
    ///
    /// The fetcher is launched here and closed before returning. Page
    /// failures are logged and recorded in `failed_urls`; only a launch
    /// failure is returned as an error.
    pub async fn crawl_summary(
        &self,
        region: Region,
        pages: RangeInclusive<u32>,
    ) -> Result<SummaryCrawl, FetchError> {
        let mut fetcher = self.launcher.launch().await?;
        let crawl = self.walk_pages(fetcher.as_mut(), region, pages).await;
        fetcher.close().await;
        Ok(crawl)
    }

    async fn walk_pages(
        &self,
        fetcher: &mut dyn PageFetcher,
        region: Region,
        pages: RangeInclusive<u32>,
    ) -> SummaryCrawl {
        let mut crawl = SummaryCrawl::default();
        let mut processed = 0usize;

        for page in pages {
            let url = listing_url(&self.settings.listing_url, region, page);
            info!(region = region.code(), page, "Fetching listing {}", url);

            let domain = self.limiter.acquire(&url).await;
            match fetch_page(fetcher, &url, region).await {
                Ok(records) => {
                    self.limiter.report_success(&domain).await;
                    debug!("Page {} yielded {} rows", page, records.len());
                    crawl.records.extend(records);
                }
                Err(e) => {
                    self.limiter.report_failure(&domain).await;
                    warn!(region = region.code(), page, "Listing page failed: {}", e);
                    crawl.failed_urls.push(url);
                }
            }

            processed += 1;
            if self.settings.summary_checkpoint.is_due(processed) {
                checkpoint::save(
                    &self.store,
                    &SummaryRecord::to_table(&crawl.records),
                    region.code(),
                    &format!("tempsum-{}{}", region.code(), processed),
                );
            }
        }

        checkpoint::save(
            &self.store,
            &SummaryRecord::to_table(&crawl.records),
            region.code(),
            &format!("tempsumall-{}{}", region.code(), processed),
        );
        crawl
    }
}

/// Persist the records whose link is not yet stored for `region`.
///
/// Returns exactly the rows that were written (possibly none). Duplicate
/// links within `raw` keep their first occurrence.
pub fn reconcile_summary(
    store: &Store,
    region: Region,
    raw: &[SummaryRecord],
) -> Result<Vec<SummaryRecord>, StoreError> {
    let known: HashSet<String> = load_summaries(store, Some(region))?
        .into_iter()
        .map(|r| r.link)
        .collect();

    let fresh: Vec<SummaryRecord> = raw
        .iter()
        .filter(|r| !known.contains(&r.link))
        .cloned()
        .map(|mut r| {
            r.region = region;
            r
        })
        .collect();
    let fresh = dedup_by_key(fresh, |r| r.link.clone());

    if !fresh.is_empty() {
        let name = format!("{}{}{}", SUMMARY_PREFIX, region.code(), timestamp_now());
        store.append(&SummaryRecord::to_table(&fresh), &name)?;
    }
    info!(
        region = region.code(),
        "{} of {} listed cases are new",
        fresh.len(),
        raw.len()
    );
    Ok(fresh)
}
