//! Pipeline Tests
//!
//! Drives the crawl-and-reconcile pipeline against a scripted in-memory site
//! with zero request delay and checkpoints disabled.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use safecase::models::{fields, DetailRecord, Region, SummaryRecord};
use safecase::pipeline::{
    load_details, load_pending, load_summaries, reconcile_details, reconcile_summary,
    select_pending, CheckpointPolicy, Pipeline, PipelineError, PipelineSettings,
};
use safecase::scrapers::{DetailCells, FetchError, FetcherLauncher, PageFetcher, RateLimiter};
use safecase::store::Store;

const LISTING: &str = "https://cases.test/list?page={page}&siteid={site}";
const REGION: Region = Region::Jiangsu;

/// Canned pages. Listing URLs that are not scripted render an empty table;
/// URLs in `failing` refuse to load.
#[derive(Default)]
struct Site {
    listings: HashMap<String, (Vec<String>, Vec<String>)>,
    details: HashMap<String, DetailCells>,
    failing: HashSet<String>,
}

impl Site {
    fn list_page(&mut self, page: u32, ids: std::ops::Range<u32>) {
        let mut cells = Vec::new();
        let mut links = Vec::new();
        for id in ids {
            cells.extend([
                id.to_string(),
                format!("主体{}", id),
                format!("2024/01/{:02}", id % 28 + 1),
                format!("苏汇检罚〔2024〕{}号", id),
            ]);
            links.push(case_link(id));
        }
        self.listings.insert(page_url(page), (cells, links));
    }

    fn detail_page(&mut self, id: u32, pairs: &[(&str, &str)]) {
        self.details.insert(
            case_link(id),
            DetailCells {
                headers: pairs.iter().map(|(k, _)| k.to_string()).collect(),
                values: pairs.iter().map(|(_, v)| v.to_string()).collect(),
            },
        );
    }
}

fn page_url(page: u32) -> String {
    safecase::pipeline::listing_url(LISTING, REGION, page)
}

fn case_link(id: u32) -> String {
    format!("https://cases.test/case/{}", id)
}

#[derive(Default)]
struct Calls {
    launches: AtomicUsize,
    closes: AtomicUsize,
    requests: Mutex<Vec<String>>,
}

impl Calls {
    fn requested(&self, url: &str) -> bool {
        self.requests.lock().unwrap().iter().any(|u| u == url)
    }
}

struct ScriptedFetcher {
    site: Arc<Site>,
    calls: Arc<Calls>,
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch_listing(&mut self, url: &str) -> Result<Vec<String>, FetchError> {
        self.calls.requests.lock().unwrap().push(url.to_string());
        if self.site.failing.contains(url) {
            return Err(FetchError::Navigation {
                url: url.to_string(),
                reason: "timed out".to_string(),
            });
        }
        Ok(self
            .site
            .listings
            .get(url)
            .map(|(cells, _)| cells.clone())
            .unwrap_or_default())
    }

    async fn fetch_anchors(&mut self, url: &str) -> Result<Vec<String>, FetchError> {
        Ok(self
            .site
            .listings
            .get(url)
            .map(|(_, links)| links.clone())
            .unwrap_or_default())
    }

    async fn fetch_detail(&mut self, url: &str) -> Result<DetailCells, FetchError> {
        self.calls.requests.lock().unwrap().push(url.to_string());
        self.site
            .details
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Navigation {
                url: url.to_string(),
                reason: "not found".to_string(),
            })
    }

    async fn close(&mut self) {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
    }
}

struct ScriptedLauncher {
    site: Arc<Site>,
    calls: Arc<Calls>,
    broken: bool,
}

#[async_trait]
impl FetcherLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Box<dyn PageFetcher>, FetchError> {
        if self.broken {
            return Err(FetchError::Launch("no browser".to_string()));
        }
        self.calls.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedFetcher {
            site: self.site.clone(),
            calls: self.calls.clone(),
        }))
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    pipeline: Pipeline,
    calls: Arc<Calls>,
}

impl Harness {
    fn new(site: Site) -> Self {
        Self::build(site, false)
    }

    fn build(site: Site, broken: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("safe"), dir.path().join("temp"));
        let calls = Arc::new(Calls::default());
        let launcher = ScriptedLauncher {
            site: Arc::new(site),
            calls: calls.clone(),
            broken,
        };
        let settings = PipelineSettings {
            listing_url: LISTING.to_string(),
            summary_checkpoint: CheckpointPolicy::disabled(),
            detail_checkpoint: CheckpointPolicy::disabled(),
        };
        let pipeline = Pipeline::new(store, Arc::new(launcher), RateLimiter::immediate(), settings);
        Self {
            _dir: dir,
            pipeline,
            calls,
        }
    }

    fn store(&self) -> &Store {
        self.pipeline.store()
    }

    fn stored_links(&self) -> HashSet<String> {
        load_summaries(self.store(), Some(REGION))
            .unwrap()
            .into_iter()
            .map(|r| r.link)
            .collect()
    }
}

fn narrative_pairs(facts: &str) -> Vec<(&str, &str)> {
    vec![
        (fields::SUBJECT_NAME, "某公司"),
        (fields::VIOLATION_FACTS, facts),
        (fields::FINE, "12.5"),
    ]
}

#[tokio::test]
async fn test_all_new_page_continues_to_next_page() {
    let mut site = Site::default();
    site.list_page(1, 0..10);
    site.list_page(2, 10..20);
    let h = Harness::new(site);

    // Page 2 is already stored, so the second pass finds nothing new.
    let older: Vec<SummaryRecord> = h
        .pipeline
        .crawl_summary(REGION, 2..=2)
        .await
        .unwrap()
        .records;
    reconcile_summary(h.store(), REGION, &older).unwrap();

    let update = h.pipeline.update_case_list(REGION, 1..=1).await.unwrap();
    assert_eq!(update.passes.len(), 2);
    assert_eq!((update.passes[0].first_page, update.passes[0].last_page), (1, 1));
    assert_eq!((update.passes[0].fetched, update.passes[0].new), (10, 10));
    assert_eq!((update.passes[1].first_page, update.passes[1].last_page), (2, 2));
    assert_eq!(update.passes[1].new, 0);
    assert!(!h.calls.requested(&page_url(3)));
    assert_eq!(h.stored_links().len(), 20);
}

#[tokio::test]
async fn test_second_identical_update_finds_nothing_new() {
    let mut site = Site::default();
    site.list_page(1, 0..5);
    let h = Harness::new(site);

    let first = h.pipeline.update_case_list(REGION, 1..=1).await.unwrap();
    assert_eq!(first.new_count(), 5);

    let second = h.pipeline.update_case_list(REGION, 1..=1).await.unwrap();
    assert_eq!(second.passes.len(), 1);
    assert_eq!(second.passes[0].fetched, 5);
    assert_eq!(second.new_count(), 0);

    let raw = h.pipeline.crawl_summary(REGION, 1..=1).await.unwrap().records;
    assert!(reconcile_summary(h.store(), REGION, &raw).unwrap().is_empty());
}

#[tokio::test]
async fn test_stored_links_only_grow() {
    let mut site = Site::default();
    site.list_page(1, 0..3);
    site.list_page(2, 2..6);
    let h = Harness::new(site);

    let page1 = h.pipeline.crawl_summary(REGION, 1..=1).await.unwrap().records;
    reconcile_summary(h.store(), REGION, &page1).unwrap();
    let before = load_summaries(h.store(), Some(REGION)).unwrap();

    let page2 = h.pipeline.crawl_summary(REGION, 2..=2).await.unwrap().records;
    let new = reconcile_summary(h.store(), REGION, &page2).unwrap();
    assert_eq!(new.len(), 3);

    let after = load_summaries(h.store(), Some(REGION)).unwrap();
    assert_eq!(after.len(), 6);
    for record in &before {
        assert!(after.contains(record));
    }
}

#[tokio::test]
async fn test_empty_pages_are_a_no_op() {
    let h = Harness::new(Site::default());

    let crawl = h.pipeline.crawl_summary(REGION, 1..=3).await.unwrap();
    assert!(crawl.records.is_empty());
    assert!(crawl.failed_urls.is_empty());

    let update = h.pipeline.update_case_list(REGION, 1..=1).await.unwrap();
    assert_eq!(update.passes.len(), 1);
    assert_eq!(update.new_count(), 0);

    let details = h.pipeline.crawl_details(REGION, &[]).await.unwrap();
    assert!(details.records.is_empty());

    let detail_update = h.pipeline.update_case_details(REGION).await.unwrap();
    assert_eq!(detail_update.pending, 0);
    assert!(load_summaries(h.store(), None).unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_listing_page_is_skipped() {
    let mut site = Site::default();
    site.list_page(1, 0..3);
    site.list_page(3, 3..5);
    site.failing.insert(page_url(2));
    let h = Harness::new(site);

    let crawl = h.pipeline.crawl_summary(REGION, 1..=3).await.unwrap();
    assert_eq!(crawl.failed_urls, vec![page_url(2)]);
    assert!(h.calls.requested(&page_url(3)));
    let links: HashSet<String> = crawl.records.iter().map(|r| r.link.clone()).collect();
    assert_eq!(links, (0..5).map(case_link).collect::<HashSet<_>>());

    reconcile_summary(h.store(), REGION, &crawl.records).unwrap();
    assert_eq!(h.stored_links().len(), 5);
}

#[tokio::test]
async fn test_detail_update_and_pending_set() {
    let mut site = Site::default();
    site.list_page(1, 0..5);
    site.detail_page(0, &narrative_pairs("未按规定办理"));
    site.detail_page(1, &narrative_pairs("逃汇"));
    // Narrative missing: stored, but still pending.
    site.detail_page(2, &[(fields::SUBJECT_NAME, "某公司")]);
    // Misaligned header and value cells.
    site.details.insert(
        case_link(3),
        DetailCells {
            headers: vec![fields::SUBJECT_NAME.to_string(), fields::VIOLATION_FACTS.to_string()],
            values: vec!["某公司".to_string()],
        },
    );
    // Case 4 has no detail page at all.
    let h = Harness::new(site);

    h.pipeline.update_case_list(REGION, 1..=1).await.unwrap();
    let update = h.pipeline.update_case_details(REGION).await.unwrap();
    assert_eq!(update.pending, 5);
    assert_eq!(update.fetched, 3);
    assert_eq!(update.saved, 3);
    let failed: HashSet<&str> = update.failed_urls.iter().map(String::as_str).collect();
    assert_eq!(failed, HashSet::from([case_link(3).as_str(), case_link(4).as_str()]));

    let pending = select_pending(h.store(), REGION).unwrap();
    let pending_links: HashSet<String> = pending.iter().map(|p| p.link.clone()).collect();
    let complete: HashSet<String> = load_details(h.store(), Some(REGION))
        .unwrap()
        .into_iter()
        .filter(DetailRecord::has_narrative)
        .map(|d| d.link().to_string())
        .collect();
    let expected: HashSet<String> = h.stored_links().difference(&complete).cloned().collect();
    assert_eq!(pending_links, expected);
    assert_eq!(
        pending_links,
        HashSet::from([case_link(2), case_link(3), case_link(4)])
    );
    assert_eq!(load_pending(h.store(), REGION).unwrap(), pending);
}

#[tokio::test]
async fn test_stale_pending_snapshot_does_not_duplicate_details() {
    let mut site = Site::default();
    site.list_page(1, 0..2);
    site.detail_page(0, &narrative_pairs("事实"));
    site.detail_page(1, &narrative_pairs("事实"));
    let h = Harness::new(site);

    h.pipeline.update_case_list(REGION, 1..=1).await.unwrap();
    let stale = select_pending(h.store(), REGION).unwrap();

    for _ in 0..2 {
        let crawl = h.pipeline.crawl_details(REGION, &stale).await.unwrap();
        reconcile_details(h.store(), REGION, crawl.records).unwrap();
    }
    assert_eq!(load_details(h.store(), Some(REGION)).unwrap().len(), 2);
}

#[tokio::test]
async fn test_narrative_round_trips_byte_for_byte() {
    let facts = "该公司于2023年,以\"虚假\"贸易\n收汇 1,000 万元;\r\n另有\\转账,\"\"";
    let mut site = Site::default();
    site.list_page(1, 0..1);
    site.detail_page(0, &narrative_pairs(facts));
    let h = Harness::new(site);

    h.pipeline.update_case_list(REGION, 1..=1).await.unwrap();
    h.pipeline.update_case_details(REGION).await.unwrap();

    let stored = load_details(h.store(), Some(REGION)).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].narrative(), Some(facts));
    assert_eq!(stored[0].link(), case_link(0));
    assert_eq!(stored[0].amount(), 12.5);
}

#[tokio::test]
async fn test_fetcher_closed_after_every_crawl() {
    let mut site = Site::default();
    site.list_page(1, 0..3);
    let h = Harness::new(site);

    h.pipeline.update_case_list(REGION, 1..=1).await.unwrap();
    // No detail pages exist, so every row fails.
    let update = h.pipeline.update_case_details(REGION).await.unwrap();
    assert_eq!(update.failed_urls.len(), 3);
    assert_eq!(update.saved, 0);

    let launches = h.calls.launches.load(Ordering::SeqCst);
    assert!(launches >= 2);
    assert_eq!(h.calls.closes.load(Ordering::SeqCst), launches);
}

#[tokio::test]
async fn test_launch_failure_is_returned() {
    let h = Harness::build(Site::default(), true);

    let err = h.pipeline.update_case_list(REGION, 1..=1).await.unwrap_err();
    assert!(matches!(err, PipelineError::Fetch(FetchError::Launch(_))));

    let results = h.pipeline.update_lists(&[REGION, Region::Anhui], 1..=1).await;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|(_, r)| r.is_err()));
}

#[tokio::test]
async fn test_update_details_for_many_regions() {
    let mut site = Site::default();
    site.list_page(1, 0..1);
    site.detail_page(0, &narrative_pairs("事实"));
    let h = Harness::new(site);

    h.pipeline.update_case_list(REGION, 1..=1).await.unwrap();
    let results = h.pipeline.update_details(&[REGION, Region::Anhui]).await;
    let saved: Vec<usize> = results
        .into_iter()
        .map(|(_, r)| r.unwrap().saved)
        .collect();
    assert_eq!(saved, vec![1, 0]);
}
