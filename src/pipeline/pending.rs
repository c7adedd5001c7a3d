//! Pending-detail selection and staleness checks.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use super::{dedup_by_key, load_complete_details, load_summaries};
use crate::models::{Region, SummaryRecord};
use crate::store::{Store, StoreError, PENDING_PREFIX};

fn pending_name(region: Region) -> String {
    format!("{}{}", PENDING_PREFIX, region.code())
}

/// Summary records of `region` that have no complete detail record yet.
///
/// Sorted newest first and written over the region's pending snapshot. The
/// snapshot is replaced even when empty so a stale one never survives.
pub fn select_pending(store: &Store, region: Region) -> Result<Vec<SummaryRecord>, StoreError> {
    let detailed: HashSet<String> = load_complete_details(store, Some(region))?
        .into_iter()
        .map(|r| r.link().to_string())
        .collect();

    let pending: Vec<SummaryRecord> = load_summaries(store, Some(region))?
        .into_iter()
        .filter(|r| !detailed.contains(&r.link))
        .collect();
    let mut pending = dedup_by_key(pending, |r| r.link.clone());
    sort_newest_first(&mut pending);

    store.replace(&SummaryRecord::to_table(&pending), &pending_name(region))?;
    info!(region = region.code(), "{} case(s) pending detail", pending.len());
    Ok(pending)
}

/// The last pending snapshot written for `region`.
pub fn load_pending(store: &Store, region: Region) -> Result<Vec<SummaryRecord>, StoreError> {
    let table = store.load_named(&pending_name(region))?;
    Ok(SummaryRecord::from_table(&table))
}

/// Newest publish date first; unparsable dates last, in stable order.
fn sort_newest_first(records: &mut [SummaryRecord]) {
    records.sort_by_key(|r| Reverse(r.publish_date()));
}

/// Summary versus detail coverage of one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Staleness {
    pub region: Region,
    pub summary_count: usize,
    /// Detail rows that carry a narrative.
    pub detail_count: usize,
    pub latest_summary: Option<NaiveDate>,
    pub latest_detail: Option<NaiveDate>,
}

impl Staleness {
    /// More listed cases than detailed ones.
    pub fn is_pending(&self) -> bool {
        self.summary_count > self.detail_count
    }

    /// The newest detail is older than the newest listing.
    pub fn detail_lags(&self) -> bool {
        match (self.latest_summary, self.latest_detail) {
            (Some(s), Some(d)) => d < s,
            (Some(_), None) => true,
            _ => false,
        }
    }

    /// Either the counts or the dates show missing details.
    pub fn needs_details(&self) -> bool {
        self.is_pending() || self.detail_lags()
    }
}

/// Staleness of each of `regions`, loading the store once.
pub fn staleness(store: &Store, regions: &[Region]) -> Result<Vec<Staleness>, StoreError> {
    let summaries = load_summaries(store, None)?;
    let details = load_complete_details(store, None)?;

    let mut by_region: HashMap<Region, Staleness> = regions
        .iter()
        .map(|&region| {
            (
                region,
                Staleness {
                    region,
                    summary_count: 0,
                    detail_count: 0,
                    latest_summary: None,
                    latest_detail: None,
                },
            )
        })
        .collect();

    for s in &summaries {
        if let Some(entry) = by_region.get_mut(&s.region) {
            entry.summary_count += 1;
            entry.latest_summary = entry.latest_summary.max(s.publish_date());
        }
    }
    for d in &details {
        if let Some(entry) = by_region.get_mut(&d.region()) {
            entry.detail_count += 1;
            entry.latest_detail = entry.latest_detail.max(d.publish_date());
        }
    }

    Ok(regions
        .iter()
        .filter_map(|r| by_region.remove(r))
        .collect())
}

/// Regions with more listed than detailed cases, or whose newest detail is
/// older than their newest listing.
pub fn pending_regions(store: &Store, regions: &[Region]) -> Result<Vec<Region>, StoreError> {
    Ok(staleness(store, regions)?
        .into_iter()
        .filter(Staleness::needs_details)
        .map(|s| s.region)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{fields, DetailRecord};
    use crate::pipeline::{reconcile_details, reconcile_summary};

    fn summary(link: &str, date: &str, region: Region) -> SummaryRecord {
        SummaryRecord {
            sequence_no: String::new(),
            subject_name: "甲".into(),
            raw_date: date.into(),
            link: link.into(),
            document_no: String::new(),
            region,
        }
    }

    fn detail(link: &str, narrative: Option<&str>, region: Region) -> DetailRecord {
        let pairs = narrative
            .map(|n| vec![(fields::VIOLATION_FACTS.to_string(), n.to_string())])
            .unwrap_or_default();
        DetailRecord::new(link, "2024/01/01", region, pairs).unwrap()
    }

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("safe"), dir.path().join("temp"));
        (dir, store)
    }

    #[test]
    fn test_pending_is_summary_minus_complete_details() {
        let (_dir, store) = store();
        let r = Region::Jiangsu;
        reconcile_summary(
            &store,
            r,
            &[
                summary("a", "2024/01/01", r),
                summary("b", "2024/03/01", r),
                summary("c", "bad", r),
                summary("d", "2024-02-01", r),
            ],
        )
        .unwrap();
        reconcile_details(&store, r, vec![detail("a", Some("事实"), r), detail("d", None, r)]).unwrap();

        let pending = select_pending(&store, r).unwrap();
        let links: Vec<&str> = pending.iter().map(|p| p.link.as_str()).collect();
        assert_eq!(links, vec!["b", "d", "c"]);

        let snapshot = load_pending(&store, r).unwrap();
        assert_eq!(snapshot, pending);
    }

    #[test]
    fn test_snapshot_is_replaced_when_empty() {
        let (_dir, store) = store();
        let r = Region::Jiangsu;
        reconcile_summary(&store, r, &[summary("a", "2024/01/01", r)]).unwrap();
        assert_eq!(select_pending(&store, r).unwrap().len(), 1);

        reconcile_details(&store, r, vec![detail("a", Some("事实"), r)]).unwrap();
        assert!(select_pending(&store, r).unwrap().is_empty());
        assert!(load_pending(&store, r).unwrap().is_empty());
    }

    #[test]
    fn test_staleness() {
        let (_dir, store) = store();
        let (a, b) = (Region::Anhui, Region::Hubei);
        reconcile_summary(&store, a, &[summary("a1", "2024/02/01", a), summary("a2", "2024/01/01", a)]).unwrap();
        reconcile_summary(&store, b, &[summary("b1", "2024/01/01", b)]).unwrap();
        reconcile_details(&store, a, vec![detail("a2", Some("x"), a)]).unwrap();
        reconcile_details(&store, b, vec![detail("b1", Some("x"), b)]).unwrap();

        let report = staleness(&store, &[a, b, Region::Xizang]).unwrap();
        assert_eq!(report.len(), 3);
        assert!(report[0].is_pending());
        assert!(report[0].detail_lags());
        assert!(!report[1].is_pending());
        assert!(!report[2].is_pending());

        assert_eq!(pending_regions(&store, &[a, b]).unwrap(), vec![a]);
    }

    #[test]
    fn test_lagging_detail_dates_mark_region_pending() {
        let (_dir, store) = store();
        let r = Region::Shandong;
        // Counts match, but the only detail predates the newest listing.
        reconcile_summary(&store, r, &[summary("s1", "2024/03/01", r)]).unwrap();
        reconcile_details(&store, r, vec![detail("s1", Some("x"), r)]).unwrap();

        let report = staleness(&store, &[r]).unwrap();
        assert!(!report[0].is_pending());
        assert!(report[0].detail_lags());
        assert!(report[0].needs_details());
        assert_eq!(pending_regions(&store, &[r]).unwrap(), vec![r]);
    }
}
