//! Data models for enforcement case records.

mod dates;
mod detail;
mod region;
mod summary;

pub use dates::{month_key, parse_date, timestamp_now};
pub use detail::{fields, DetailRecord};
pub use region::Region;
pub use summary::SummaryRecord;

use thiserror::Error;

/// Column holding the case link in every stored table.
pub const COL_LINK: &str = "link";
/// Column holding the raw publish date in every stored table.
pub const COL_DATE: &str = "date";
/// Column holding the region display name in every stored table.
pub const COL_REGION: &str = "区域";

/// A stored row could not be turned into a record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("Record is missing required field '{0}'")]
    MissingField(&'static str),
    #[error("Unknown region: {0}")]
    UnknownRegion(String),
}
