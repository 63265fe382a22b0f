use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Serialize;

use crate::error::Error;

/// Used when GitHub signals a limit but sends no reset hint.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RateLimitSnapshot {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_at: Option<DateTime<Utc>>,
}

/// Remembers the last quota GitHub reported. It never sleeps: callers are
/// told about exhaustion through [`Error::RateLimited`] and decide themselves.
pub struct RateLimitTracker {
    state: Mutex<RateLimitSnapshot>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RateLimitSnapshot::default()),
        }
    }

    pub fn update_from_headers(&self, headers: &HeaderMap) {
        let limit = header_number::<u32>(headers, "x-ratelimit-limit");
        let remaining = header_number::<u32>(headers, "x-ratelimit-remaining");
        let reset_at = header_number::<i64>(headers, "x-ratelimit-reset")
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single());

        if limit.is_none() && remaining.is_none() && reset_at.is_none() {
            return;
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.limit = limit.or(state.limit);
        state.remaining = remaining.or(state.remaining);
        state.reset_at = reset_at.or(state.reset_at);
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns `Some(RateLimited)` when the response is GitHub's rate-limit
/// signal: a 429, or a 403 carrying `retry-after` or an exhausted quota.
pub fn detect_rate_limit(status: StatusCode, headers: &HeaderMap, endpoint: &str) -> Option<Error> {
    let exhausted = header_number::<u32>(headers, "x-ratelimit-remaining") == Some(0);
    let has_retry_after = headers.contains_key(reqwest::header::RETRY_AFTER);

    let limited = status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && (exhausted || has_retry_after));
    if !limited {
        return None;
    }

    Some(Error::RateLimited {
        retry_after: retry_after_from_headers(headers, Utc::now().timestamp()),
        endpoint: endpoint.to_string(),
    })
}

fn retry_after_from_headers(headers: &HeaderMap, now: i64) -> Duration {
    if let Some(secs) = header_number::<u64>(headers, "retry-after") {
        return Duration::from_secs(secs);
    }
    if let Some(reset) = header_number::<i64>(headers, "x-ratelimit-reset") {
        return Duration::from_secs((reset - now).max(0) as u64);
    }
    DEFAULT_RETRY_AFTER
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
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
    fn test_exhausted_quota_on_403_is_rate_limited() {
        let h = headers(&[("x-ratelimit-remaining", "0"), ("x-ratelimit-reset", "4102444800")]);
        let err = detect_rate_limit(StatusCode::FORBIDDEN, &h, "/users/octo/repos").unwrap();
        match err {
            Error::RateLimited { endpoint, retry_after } => {
                assert_eq!(endpoint, "/users/octo/repos");
                assert!(retry_after > Duration::from_secs(60));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_plain_403_is_not_rate_limited() {
        let h = headers(&[("x-ratelimit-remaining", "4999")]);
        assert!(detect_rate_limit(StatusCode::FORBIDDEN, &h, "/x").is_none());
        assert!(detect_rate_limit(StatusCode::OK, &HeaderMap::new(), "/x").is_none());
    }

    #[test]
    fn test_retry_after_prefers_explicit_header() {
        let h = headers(&[("retry-after", "17"), ("x-ratelimit-reset", "1000")]);
        assert_eq!(retry_after_from_headers(&h, 0), Duration::from_secs(17));

        let h = headers(&[("x-ratelimit-reset", "1030")]);
        assert_eq!(retry_after_from_headers(&h, 1000), Duration::from_secs(30));

        let h = headers(&[("x-ratelimit-reset", "900")]);
        assert_eq!(retry_after_from_headers(&h, 1000), Duration::ZERO);

        assert_eq!(retry_after_from_headers(&HeaderMap::new(), 0), DEFAULT_RETRY_AFTER);
    }

    #[test]
    fn test_tracker_keeps_last_reported_quota() {
        let tracker = RateLimitTracker::new();
        tracker.update_from_headers(&headers(&[
            ("x-ratelimit-limit", "5000"),
            ("x-ratelimit-remaining", "4321"),
        ]));
        tracker.update_from_headers(&HeaderMap::new());

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.limit, Some(5000));
        assert_eq!(snapshot.remaining, Some(4321));
    }
}
