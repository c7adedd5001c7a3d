//! Aggregates over the stored tables.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{month_key, timestamp_now, DetailRecord, Region, SummaryRecord, COL_LINK};
use crate::store::{Store, StoreResult, Table, AMOUNT_PREFIX};

/// Column holding the total penalty in [`amount_table`].
pub const COL_AMOUNT: &str = "amount";

/// Publish-date span and case count of one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionOverview {
    pub region: Region,
    pub count: usize,
    pub earliest: Option<NaiveDate>,
    pub latest: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overview {
    /// Latest publish date first; regions without dated cases last.
    pub regions: Vec<RegionOverview>,
    pub total: usize,
    pub earliest: Option<NaiveDate>,
    pub latest: Option<NaiveDate>,
}

fn widen(span: &mut (Option<NaiveDate>, Option<NaiveDate>), date: Option<NaiveDate>) {
    if let Some(date) = date {
        span.0 = Some(span.0.map_or(date, |d| d.min(date)));
        span.1 = Some(span.1.map_or(date, |d| d.max(date)));
    }
}

/// Per-region and overall date span of `details`.
pub fn region_overview(details: &[DetailRecord]) -> Overview {
    let mut by_region: HashMap<Region, RegionOverview> = HashMap::new();
    let mut overall = (None, None);

    for d in details {
        let date = d.publish_date();
        let entry = by_region.entry(d.region()).or_insert(RegionOverview {
            region: d.region(),
            count: 0,
            earliest: None,
            latest: None,
        });
        entry.count += 1;
        let mut span = (entry.earliest, entry.latest);
        widen(&mut span, date);
        (entry.earliest, entry.latest) = span;
        widen(&mut overall, date);
    }

    let mut regions: Vec<RegionOverview> = by_region.into_values().collect();
    regions.sort_by_key(|r| (Reverse(r.latest), r.region));

    Overview {
        regions,
        total: details.len(),
        earliest: overall.0,
        latest: overall.1,
    }
}

/// Size and date span of one stored table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableCoverage {
    pub rows: usize,
    pub distinct_links: usize,
    pub earliest: Option<NaiveDate>,
    pub latest: Option<NaiveDate>,
}

impl TableCoverage {
    fn from_items<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<NaiveDate>)>,
    {
        let mut links = HashSet::new();
        let mut span = (None, None);
        let mut rows = 0;
        for (link, date) in items {
            rows += 1;
            links.insert(link);
            widen(&mut span, date);
        }
        Self {
            rows,
            distinct_links: links.len(),
            earliest: span.0,
            latest: span.1,
        }
    }
}

/// Summary and detail coverage of one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Coverage {
    pub region: Region,
    pub summary: TableCoverage,
    pub detail: TableCoverage,
}

/// Coverage of `region` within the given summary and detail records.
pub fn coverage(region: Region, summaries: &[SummaryRecord], details: &[DetailRecord]) -> Coverage {
    Coverage {
        region,
        summary: TableCoverage::from_items(
            summaries
                .iter()
                .filter(|s| s.region == region)
                .map(|s| (s.link.as_str(), s.publish_date())),
        ),
        detail: TableCoverage::from_items(
            details
                .iter()
                .filter(|d| d.region() == region)
                .map(|d| (d.link(), d.publish_date())),
        ),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyBucket {
    /// `%Y-%m`.
    pub month: String,
    pub count: usize,
    /// Summed total penalty, in 万元.
    pub amount: f64,
}

/// Case count and penalty sum per publish month, oldest month first.
/// Undated cases are left out.
pub fn monthly(details: &[DetailRecord]) -> Vec<MonthlyBucket> {
    let mut months: BTreeMap<String, (usize, f64)> = BTreeMap::new();
    for d in details {
        if let Some(date) = d.publish_date() {
            let entry = months.entry(month_key(date)).or_default();
            entry.0 += 1;
            entry.1 += d.amount();
        }
    }
    months
        .into_iter()
        .map(|(month, (count, amount))| MonthlyBucket { month, count, amount })
        .collect()
}

/// Case count per region, most cases first.
pub fn by_region_counts(details: &[DetailRecord]) -> Vec<(Region, usize)> {
    let mut counts: HashMap<Region, usize> = HashMap::new();
    for d in details {
        *counts.entry(d.region()).or_default() += 1;
    }
    let mut counts: Vec<(Region, usize)> = counts.into_iter().collect();
    counts.sort_by_key(|&(region, n)| (Reverse(n), region));
    counts
}

/// `link, amount` rows for every case.
pub fn amount_table(details: &[DetailRecord]) -> Table {
    let mut table = Table::new([COL_LINK, COL_AMOUNT]);
    for d in details {
        table.push_row(vec![d.link().to_string(), d.amount().to_string()]);
    }
    table
}

/// Write `table` into the store as a timestamped amount file.
pub fn save_amounts(store: &Store, table: &Table) -> StoreResult<PathBuf> {
    store.append(table, &format!("{}{}", AMOUNT_PREFIX, timestamp_now()))
}
