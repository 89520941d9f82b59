//! Date handling for source documents and query windows.

use chrono::NaiveDate;

use super::patterns::{COMPACT_DATE, ISO_DATE};

/// Display format for voucher dates.
pub const DISPLAY_FORMAT: &str = "%d-%b-%Y";

/// Parse a `YYYYMMDD` or `YYYY-MM-DD` date.
pub fn parse_source_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let caps = COMPACT_DATE.captures(s).or_else(|| ISO_DATE.captures(s))?;

    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Render a source date for display (`20240401` → `01-Apr-2024`).
///
/// Text that is not a recognizable date is returned trimmed and unchanged.
pub fn display_date(s: &str) -> String {
    match parse_source_date(s) {
        Some(date) => date.format(DISPLAY_FORMAT).to_string(),
        None => s.trim().to_string(),
    }
}

/// Normalize a query date to the `YYYYMMDD` form the source expects.
pub fn compact_date(s: &str) -> Option<String> {
    parse_source_date(s).map(|d| d.format("%Y%m%d").to_string())
}
