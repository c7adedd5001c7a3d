//! Full case records scraped from detail pages.

use chrono::NaiveDate;
use serde::Serialize;

use super::{parse_date, RecordError, Region, COL_DATE, COL_LINK, COL_REGION};
use crate::store::{Row, Table};

/// Header labels of the fields the pipeline and search engine rely on.
pub mod fields {
    pub const DOCUMENT_NO: &str = "行政处罚决定书文号";
    pub const SUBJECT_NAME: &str = "违规主体名称";
    pub const LEGAL_REPRESENTATIVE: &str = "法定代表人或负责人姓名";
    pub const REGISTERED_ADDRESS: &str = "注册地址";
    pub const CREDIT_CODE: &str = "统一社会信用代码";
    pub const AUTHORITY: &str = "作出处罚决定的行政机关名称";
    pub const VIOLATION_TYPE: &str = "违法行为类型";
    /// The narrative field. A detail row without it is treated as not fetched.
    pub const VIOLATION_FACTS: &str = "违法事实";
    pub const PENALTY_BASIS: &str = "处罚依据";
    pub const PENALTY_CATEGORY: &str = "处罚类别";
    pub const PENALTY_CONTENT: &str = "处罚内容";
    pub const FINE: &str = "罚款金额（万元）";
    pub const CONFISCATION: &str = "没收金额（万元）";
    pub const COMBINED_PENALTY: &str = "罚没款金额（万元）";
    pub const DECISION_DATE: &str = "处罚决定日期";
    pub const DISCLOSURE_DEADLINE: &str = "公开截止期";
    pub const REMARKS: &str = "备注";

    /// Fields summed into the total penalty amount.
    pub const AMOUNT_FIELDS: [&str; 3] = [FINE, CONFISCATION, COMBINED_PENALTY];
}

/// A case's full content keyed by its link.
///
/// `link`, `raw_date` and `region` are required; everything else scraped from
/// the page is kept as ordered `(header, value)` pairs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRecord {
    link: String,
    raw_date: String,
    region: Region,
    fields: Vec<(String, String)>,
}

impl DetailRecord {
    pub fn new(
        link: impl Into<String>,
        raw_date: impl Into<String>,
        region: Region,
        fields: Vec<(String, String)>,
    ) -> Result<Self, RecordError> {
        let link = link.into();
        let raw_date = raw_date.into();
        if link.trim().is_empty() {
            return Err(RecordError::MissingField(COL_LINK));
        }
        if raw_date.trim().is_empty() {
            return Err(RecordError::MissingField(COL_DATE));
        }

        // Reserved columns are owned by the record itself. A repeated header
        // keeps its first position and its last value, as a stored row would.
        let mut unique: Vec<(String, String)> = Vec::with_capacity(fields.len());
        for (key, value) in fields {
            if matches!(key.as_str(), COL_LINK | COL_DATE | COL_REGION) {
                continue;
            }
            match unique.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => unique.push((key, value)),
            }
        }
        let fields = unique;

        Ok(Self {
            link,
            raw_date,
            region,
            fields,
        })
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn raw_date(&self) -> &str {
        &self.raw_date
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn publish_date(&self) -> Option<NaiveDate> {
        parse_date(&self.raw_date)
    }

    /// Scraped field value, `None` when absent or empty.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Scraped field value, empty string when absent.
    pub fn field_or_empty(&self, name: &str) -> &str {
        self.field(name).unwrap_or_default()
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn narrative(&self) -> Option<&str> {
        self.field(fields::VIOLATION_FACTS)
    }

    pub fn has_narrative(&self) -> bool {
        self.narrative().is_some()
    }

    /// Total penalty in 万元: fine + confiscation + combined penalty, each
    /// counted as zero when absent or not a number.
    pub fn amount(&self) -> f64 {
        fields::AMOUNT_FIELDS
            .iter()
            .map(|name| parse_amount(self.field(name)))
            .sum()
    }

    pub fn from_row(row: &Row<'_>) -> Result<Self, RecordError> {
        let link = row
            .get(COL_LINK)
            .ok_or(RecordError::MissingField(COL_LINK))?;
        let date = row
            .get(COL_DATE)
            .ok_or(RecordError::MissingField(COL_DATE))?;
        let region_name = row
            .get(COL_REGION)
            .ok_or(RecordError::MissingField(COL_REGION))?;
        let region = Region::from_name(region_name)
            .ok_or_else(|| RecordError::UnknownRegion(region_name.to_string()))?;

        let fields = row
            .fields()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self::new(link, date, region, fields)
    }

    /// Parse every row of a stored detail table, skipping unusable rows.
    pub fn from_table(table: &Table) -> Vec<Self> {
        table
            .rows()
            .filter_map(|row| match Self::from_row(&row) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::debug!("Skipping detail row: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Scraped columns first, in first-seen order, then link, date and region.
    pub fn to_table(records: &[Self]) -> Table {
        let mut table = Table::default();
        for r in records {
            table.push_fields(
                r.fields
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .chain([
                        (COL_LINK, r.link.as_str()),
                        (COL_DATE, r.raw_date.as_str()),
                        (COL_REGION, r.region.name()),
                    ]),
            );
        }
        table
    }
}

fn parse_amount(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().replace(',', "").parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}
