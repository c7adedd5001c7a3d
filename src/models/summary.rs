//! List-level case records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{parse_date, RecordError, Region, COL_DATE, COL_LINK, COL_REGION};
use crate::store::{Row, Table};

const COL_NO: &str = "no";
const COL_NAME: &str = "name";
const COL_DOC: &str = "doc";

/// One entry from a region's listing page: a pointer to a case.
///
/// Identity is `link`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub sequence_no: String,
    pub subject_name: String,
    /// Publish date as shown on the listing page.
    pub raw_date: String,
    pub link: String,
    pub document_no: String,
    pub region: Region,
}

impl SummaryRecord {
    pub fn publish_date(&self) -> Option<NaiveDate> {
        parse_date(&self.raw_date)
    }

    /// Column order used when writing summary batches.
    pub fn columns() -> [&'static str; 6] {
        [COL_NO, COL_NAME, COL_DATE, COL_LINK, COL_DOC, COL_REGION]
    }

    pub fn from_row(row: &Row<'_>) -> Result<Self, RecordError> {
        let link = row
            .get(COL_LINK)
            .ok_or(RecordError::MissingField(COL_LINK))?;
        let region_name = row
            .get(COL_REGION)
            .ok_or(RecordError::MissingField(COL_REGION))?;
        let region = Region::from_name(region_name)
            .ok_or_else(|| RecordError::UnknownRegion(region_name.to_string()))?;

        let text = |col: &str| row.get(col).unwrap_or_default().to_string();
        Ok(Self {
            sequence_no: text(COL_NO),
            subject_name: text(COL_NAME),
            raw_date: text(COL_DATE),
            link: link.to_string(),
            document_no: text(COL_DOC),
            region,
        })
    }

    /// Parse every row of a stored summary table, skipping unusable rows.
    pub fn from_table(table: &Table) -> Vec<Self> {
        table
            .rows()
            .filter_map(|row| match Self::from_row(&row) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::debug!("Skipping summary row: {}", e);
                    None
                }
            })
            .collect()
    }

    pub fn to_table(records: &[Self]) -> Table {
        let mut table = Table::new(Self::columns());
        for r in records {
            table.push_row(vec![
                r.sequence_no.clone(),
                r.subject_name.clone(),
                r.raw_date.clone(),
                r.link.clone(),
                r.document_no.clone(),
                r.region.name().to_string(),
            ]);
        }
        table
    }
}
