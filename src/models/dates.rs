//! Publish-date parsing.

use chrono::NaiveDate;

/// Formats the listing sites use for publish dates.
const DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%Y-%m-%d"];

/// Parse a raw publish date.
///
/// Returns `None` for anything that is not one of the known formats; such
/// records stay in the store but never satisfy a date-range predicate.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Month bucket (`%Y-%m`) for aggregation.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Timestamp suffix for store filenames.
pub fn timestamp_now() -> String {
    chrono::Local::now().format("%Y%m%d%H%M%S").to_string()
}
