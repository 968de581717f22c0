//! Rate-limit bookkeeping from `X-RateLimit-*` response headers

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use serde::Serialize;
use std::time::Duration;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Last observed rate-limit window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitInfo {
    pub limit: Option<u64>,
    pub remaining: u64,
    /// When the window resets
    pub reset: Option<DateTime<Utc>>,
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// Read just the remaining count, used when decorating errors
pub fn remaining_from_headers(headers: &HeaderMap) -> Option<u64> {
    header_u64(headers, REMAINING_HEADER)
}

impl RateLimitInfo {
    /// Parse the window from response headers; `None` without a remaining count
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let remaining = header_u64(headers, REMAINING_HEADER)?;
        let reset = header_u64(headers, RESET_HEADER)
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        Some(Self {
            limit: header_u64(headers, LIMIT_HEADER),
            remaining,
            reset,
        })
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// How long to wait before the next call, capped at `max_wait`
    ///
    /// Zero unless the window is exhausted and its reset lies in the future.
    pub fn wait_duration(&self, now: DateTime<Utc>, max_wait: Duration) -> Duration {
        if !self.is_exhausted() {
            return Duration::ZERO;
        }
        let Some(reset) = self.reset else {
            return Duration::ZERO;
        };

        (reset - now)
            .to_std()
            .map(|wait| wait.min(max_wait))
            .unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_parse_full_headers() {
        let info = RateLimitInfo::from_headers(&headers(&[
            (LIMIT_HEADER, "60"),
            (REMAINING_HEADER, "59"),
            (RESET_HEADER, "1700000000"),
        ]))
        .unwrap();

        assert_eq!(info.limit, Some(60));
        assert_eq!(info.remaining, 59);
        assert_eq!(info.reset.unwrap().timestamp(), 1_700_000_000);
        assert!(!info.is_exhausted());
    }

    #[test]
    fn test_missing_remaining_yields_none() {
        assert!(RateLimitInfo::from_headers(&headers(&[(LIMIT_HEADER, "60")])).is_none());
        assert!(RateLimitInfo::from_headers(&headers(&[(REMAINING_HEADER, "abc")])).is_none());
    }

    #[test]
    fn test_wait_only_when_exhausted() {
        let now = Utc.timestamp_opt(1_000, 0).unwrap();
        let max = Duration::from_secs(3600);

        let mut info = RateLimitInfo {
            limit: Some(60),
            remaining: 3,
            reset: Some(Utc.timestamp_opt(1_030, 0).unwrap()),
        };
        assert_eq!(info.wait_duration(now, max), Duration::ZERO);

        info.remaining = 0;
        assert_eq!(info.wait_duration(now, max), Duration::from_secs(30));
    }

    #[test]
    fn test_wait_is_capped_and_never_negative() {
        let now = Utc.timestamp_opt(1_000, 0).unwrap();
        let info = RateLimitInfo {
            limit: None,
            remaining: 0,
            reset: Some(Utc.timestamp_opt(100_000, 0).unwrap()),
        };
        assert_eq!(
            info.wait_duration(now, Duration::from_secs(5)),
            Duration::from_secs(5)
        );

        let past = RateLimitInfo {
            reset: Some(Utc.timestamp_opt(10, 0).unwrap()),
            ..info
        };
        assert_eq!(past.wait_duration(now, Duration::from_secs(5)), Duration::ZERO);
    }
}
