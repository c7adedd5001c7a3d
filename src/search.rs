//! Filtering of the detail store.
//!
//! A pure function over in-memory records; nothing here touches the store.

use std::cmp::Reverse;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{fields, DetailRecord, Region};

/// Criteria for [`search`]. All predicates are ANDed.
///
/// Text filters are case-sensitive substring tests; an empty filter matches
/// everything. An empty region list means every region.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Inclusive lower publish-date bound.
    pub start: Option<NaiveDate>,
    /// Inclusive upper publish-date bound.
    pub end: Option<NaiveDate>,
    #[serde(default)]
    pub document_no: String,
    #[serde(default)]
    pub subject_name: String,
    #[serde(default)]
    pub violation_type: String,
    #[serde(default)]
    pub penalty_content: String,
    #[serde(default)]
    pub authority: String,
    #[serde(default)]
    pub regions: Vec<Region>,
    /// Inclusive minimum total penalty, in 万元.
    #[serde(default)]
    pub min_amount: f64,
}

impl SearchCriteria {
    fn text_filters(&self) -> [(&'static str, &str); 5] {
        [
            (fields::DOCUMENT_NO, self.document_no.as_str()),
            (fields::SUBJECT_NAME, self.subject_name.as_str()),
            (fields::VIOLATION_TYPE, self.violation_type.as_str()),
            (fields::PENALTY_CONTENT, self.penalty_content.as_str()),
            (fields::AUTHORITY, self.authority.as_str()),
        ]
    }

    /// A record without a parsable date fails any bound that is set.
    fn date_matches(&self, date: Option<NaiveDate>) -> bool {
        if self.start.is_none() && self.end.is_none() {
            return true;
        }
        let Some(date) = date else {
            return false;
        };
        self.start.map_or(true, |start| date >= start) && self.end.map_or(true, |end| date <= end)
    }

    pub fn matches(&self, record: &DetailRecord) -> bool {
        self.date_matches(record.publish_date())
            && (self.regions.is_empty() || self.regions.contains(&record.region()))
            && self
                .text_filters()
                .iter()
                .all(|(field, needle)| needle.is_empty() || record.field_or_empty(field).contains(needle))
            && record.amount() >= self.min_amount
    }
}

/// Records satisfying `criteria`, newest publish date first.
///
/// Records with equal (or absent) dates keep their input order; undated
/// records sort last.
pub fn search(records: &[DetailRecord], criteria: &SearchCriteria) -> Vec<DetailRecord> {
    let mut hits: Vec<DetailRecord> = records
        .iter()
        .filter(|r| criteria.matches(r))
        .cloned()
        .collect();
    hits.sort_by_key(|r| Reverse(r.publish_date()));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(link: &str, date: &str, region: Region, subject: &str, fine: &str) -> DetailRecord {
        DetailRecord::new(
            link,
            date,
            region,
            vec![
                (fields::DOCUMENT_NO.to_string(), format!("汇检罚〔2024〕{}号", link)),
                (fields::SUBJECT_NAME.to_string(), subject.to_string()),
                (fields::VIOLATION_TYPE.to_string(), "逃汇".to_string()),
                (fields::VIOLATION_FACTS.to_string(), "事实".to_string()),
                (fields::PENALTY_CONTENT.to_string(), "罚款".to_string()),
                (fields::AUTHORITY.to_string(), "国家外汇管理局".to_string()),
                (fields::FINE.to_string(), fine.to_string()),
            ],
        )
        .unwrap()
    }

    fn table() -> Vec<DetailRecord> {
        vec![
            record("1", "2024/01/10", Region::Beijing, "甲公司", "60"),
            record("2", "2024/02/10", Region::Shanghai, "乙公司", "50"),
            record("3", "2024/03/10", Region::Beijing, "丙个人", "1,200"),
            record("4", "2024/04/10", Region::Beijing, "丁公司", "500"),
            record("5", "unknown", Region::Beijing, "戊公司", "90"),
        ]
    }

    fn links(hits: &[DetailRecord]) -> Vec<&str> {
        hits.iter().map(|r| r.link()).collect()
    }

    fn date(s: &str) -> Option<NaiveDate> {
        crate::models::parse_date(s)
    }

    #[test]
    fn test_date_range_and_amount() {
        let criteria = SearchCriteria {
            start: date("2024/01/01"),
            end: date("2024/03/31"),
            min_amount: 50.0,
            ..Default::default()
        };
        assert_eq!(links(&search(&table(), &criteria)), vec!["3", "2", "1"]);
    }

    #[test]
    fn test_all_predicates_are_anded() {
        let criteria = SearchCriteria {
            start: date("2024/01/01"),
            end: date("2024/03/31"),
            subject_name: "公司".into(),
            regions: vec![Region::Beijing],
            min_amount: 50.0,
            ..Default::default()
        };
        assert_eq!(links(&search(&table(), &criteria)), vec!["1"]);

        let criteria = SearchCriteria {
            min_amount: 100.0,
            ..Default::default()
        };
        assert_eq!(links(&search(&table(), &criteria)), vec!["4", "3"]);
    }

    #[test]
    fn test_undated_records() {
        let unbounded = SearchCriteria::default();
        assert_eq!(links(&search(&table(), &unbounded)), vec!["4", "3", "2", "1", "5"]);

        let bounded = SearchCriteria {
            start: date("2000/01/01"),
            ..Default::default()
        };
        assert!(!links(&search(&table(), &bounded)).contains(&"5"));
    }

    #[test]
    fn test_text_filters_are_case_sensitive_substrings() {
        let mut records = table();
        records.push(record("6", "2024/05/01", Region::Beijing, "Acme Ltd", "0"));

        let criteria = SearchCriteria {
            subject_name: "acme".into(),
            ..Default::default()
        };
        assert!(search(&records, &criteria).is_empty());

        let criteria = SearchCriteria {
            subject_name: "Acme".into(),
            document_no: "〔2024〕6".into(),
            ..Default::default()
        };
        assert_eq!(links(&search(&records, &criteria)), vec!["6"]);
    }
}
