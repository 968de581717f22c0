//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;

use chrono::{NaiveDate, NaiveDateTime};

/// Storage format for snapshot collection dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Storage format for history timestamps (UTC, lexically sortable)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Number of pages needed to cover `total` items
pub fn page_count(total: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}

/// Format a date for storage
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a stored or user-supplied date
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

/// Format a timestamp for storage
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp, accepting a bare date as midnight
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .ok()
        .or_else(|| parse_date(value).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 100), 0);
        assert_eq!(page_count(1, 100), 1);
        assert_eq!(page_count(100, 100), 1);
        assert_eq!(page_count(250, 100), 3);
        assert_eq!(page_count(10, 0), 0);
    }

    #[test]
    fn test_date_round_trip() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(format_date(date), "2024-03-09");
        assert_eq!(parse_date("2024-03-09"), Some(date));
        assert_eq!(parse_date("03/09/2024"), None);
    }

    #[test]
    fn test_parse_timestamp_accepts_bare_date() {
        let ts = parse_timestamp("2024-03-09").unwrap();
        assert_eq!(format_timestamp(ts), "2024-03-09 00:00:00");

        let ts = parse_timestamp("2024-03-09 13:45:01").unwrap();
        assert_eq!(format_timestamp(ts), "2024-03-09 13:45:01");

        assert!(parse_timestamp("yesterday").is_none());
    }
}
