// =============================================================================
// Rate-Limit Tracker — monitors Bybit API usage to avoid 429s / 10006
// =============================================================================
//
// Every Bybit v5 response carries three headers:
//   X-Bapi-Limit                  requests allowed in the current window
//   X-Bapi-Limit-Status           requests remaining in the current window
//   X-Bapi-Limit-Reset-Timestamp  window reset time (ms since epoch)
//
// The tracker mirrors them in atomics so any task may query lock-free.
// Before the first response the limits are unknown and requests are allowed.
// =============================================================================

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use serde::Serialize;
use tracing::{debug, warn};

/// Warn once the remaining budget falls to this many requests.
const REMAINING_WARN_THRESHOLD: u32 = 10;

/// Sentinel for "no header seen yet".
const UNKNOWN: u32 = u32::MAX;

/// Thread-safe rate-limit tracker backed by atomic counters.
pub struct RateLimitTracker {
    limit: AtomicU32,
    remaining: AtomicU32,
    reset_at_ms: AtomicI64,
}

/// Serialisable view of the tracker for the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitSnapshot {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_at_ms: Option<i64>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self {
            limit: AtomicU32::new(UNKNOWN),
            remaining: AtomicU32::new(UNKNOWN),
            reset_at_ms: AtomicI64::new(0),
        }
    }

    /// Update internal counters from the HTTP response headers.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        if let Some(limit) = header_value::<u32>(headers, "X-Bapi-Limit") {
            self.limit.store(limit, Ordering::Relaxed);
        }

        if let Some(reset) = header_value::<i64>(headers, "X-Bapi-Limit-Reset-Timestamp") {
            self.reset_at_ms.store(reset, Ordering::Relaxed);
        }

        if let Some(remaining) = header_value::<u32>(headers, "X-Bapi-Limit-Status") {
            let prev = self.remaining.swap(remaining, Ordering::Relaxed);
            if remaining <= REMAINING_WARN_THRESHOLD && (prev == UNKNOWN || prev > REMAINING_WARN_THRESHOLD) {
                warn!(
                    remaining,
                    limit = self.limit.load(Ordering::Relaxed),
                    "rate-limit budget crossed warning threshold"
                );
            }
            debug!(remaining, "rate-limit budget updated from header");
        }
    }

    /// `false` only while the budget is known to be exhausted and the window
    /// has not reset yet at `now_ms`.
    pub fn can_send_request(&self, now_ms: i64) -> bool {
        let remaining = self.remaining.load(Ordering::Relaxed);
        if remaining == UNKNOWN || remaining > 0 {
            return true;
        }

        let reset_at = self.reset_at_ms.load(Ordering::Relaxed);
        let allowed = now_ms >= reset_at;
        if !allowed {
            warn!(
                reset_in_ms = reset_at - now_ms,
                "request blocked -- rate-limit budget exhausted"
            );
        }
        allowed
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        let known = |v: u32| (v != UNKNOWN).then_some(v);
        let reset = self.reset_at_ms.load(Ordering::Relaxed);
        RateLimitSnapshot {
            limit: known(self.limit.load(Ordering::Relaxed)),
            remaining: known(self.remaining.load(Ordering::Relaxed)),
            reset_at_ms: (reset > 0).then_some(reset),
        }
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitTracker")
            .field("limit", &self.limit.load(Ordering::Relaxed))
            .field("remaining", &self.remaining.load(Ordering::Relaxed))
            .field("reset_at_ms", &self.reset_at_ms.load(Ordering::Relaxed))
            .finish()
    }
}

fn header_value<T: std::str::FromStr>(headers: &reqwest::header::HeaderMap, name: &str) -> Option<T> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn headers(limit: &str, remaining: &str, reset: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert("X-Bapi-Limit", HeaderValue::from_str(limit).unwrap());
        h.insert("X-Bapi-Limit-Status", HeaderValue::from_str(remaining).unwrap());
        h.insert("X-Bapi-Limit-Reset-Timestamp", HeaderValue::from_str(reset).unwrap());
        h
    }

    #[test]
    fn unknown_until_first_response() {
        let t = RateLimitTracker::new();
        assert!(t.can_send_request(0));
        assert_eq!(
            t.snapshot(),
            RateLimitSnapshot {
                limit: None,
                remaining: None,
                reset_at_ms: None,
            }
        );
    }

    #[test]
    fn reads_bybit_headers() {
        let t = RateLimitTracker::new();
        t.update_from_headers(&headers("600", "598", "1700000001000"));
        let snap = t.snapshot();
        assert_eq!(snap.limit, Some(600));
        assert_eq!(snap.remaining, Some(598));
        assert_eq!(snap.reset_at_ms, Some(1_700_000_001_000));
        assert!(t.can_send_request(1_700_000_000_000));
    }

    #[test]
    fn exhausted_budget_blocks_until_reset() {
        let t = RateLimitTracker::new();
        t.update_from_headers(&headers("600", "0", "1700000001000"));
        assert!(!t.can_send_request(1_700_000_000_500));
        assert!(t.can_send_request(1_700_000_001_000));
    }

    #[test]
    fn garbage_headers_are_ignored() {
        let t = RateLimitTracker::new();
        t.update_from_headers(&headers("x", "y", "z"));
        assert_eq!(t.snapshot().remaining, None);
    }
}
