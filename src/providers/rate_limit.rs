// =============================================================================
// Request-Weight Tracker — keeps market-data polling under Binance's limits
// =============================================================================
//
// Binance charges every REST call a request weight and allows 1200 per
// minute per IP. We hard-cap ourselves at 1000 and read the authoritative
// figure back from the `X-MBX-USED-WEIGHT-1M` response header after every
// request. Counters are atomic so any task may query them lock-free.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

/// Hard ceiling at which we refuse to send additional requests.
pub const WEIGHT_HARD_LIMIT: u32 = 1000;
/// Soft warning threshold.
const WEIGHT_WARN_THRESHOLD: u32 = 800;

const USED_WEIGHT_HEADER: &str = "X-MBX-USED-WEIGHT-1M";

pub struct RateLimitTracker {
    used_weight_1m: AtomicU32,
    blocked_requests: AtomicU32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub used_weight_1m: u32,
    pub blocked_requests: u32,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self {
            used_weight_1m: AtomicU32::new(0),
            blocked_requests: AtomicU32::new(0),
        }
    }

    /// Adopt the used weight reported by the exchange.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        let weight = headers
            .get(USED_WEIGHT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok());
        if let Some(w) = weight {
            self.record_weight(w);
        }
    }

    fn record_weight(&self, w: u32) {
        let prev = self.used_weight_1m.swap(w, Ordering::Relaxed);
        if w >= WEIGHT_WARN_THRESHOLD && prev < WEIGHT_WARN_THRESHOLD {
            warn!(
                used_weight = w,
                hard_limit = WEIGHT_HARD_LIMIT,
                "request weight crossed warning threshold"
            );
        }
        debug!(used_weight_1m = w, "request weight updated from header");
    }

    /// Pre-flight check: `Ok` when `weight` more fits under the hard limit,
    /// otherwise the current usage.
    pub fn try_acquire(&self, weight: u32) -> Result<(), u32> {
        let current = self.used_weight_1m.load(Ordering::Relaxed);
        if current + weight <= WEIGHT_HARD_LIMIT {
            return Ok(());
        }
        self.blocked_requests.fetch_add(1, Ordering::Relaxed);
        warn!(
            current_weight = current,
            requested_weight = weight,
            hard_limit = WEIGHT_HARD_LIMIT,
            "request blocked, would exceed weight limit"
        );
        Err(current)
    }

    /// Reset the 1-minute weight counter (driven by a periodic timer).
    pub fn reset_1m_weight(&self) {
        self.used_weight_1m.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        RateLimitSnapshot {
            used_weight_1m: self.used_weight_1m.load(Ordering::Relaxed),
            blocked_requests: self.blocked_requests.load(Ordering::Relaxed),
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
            .field("used_weight_1m", &self.used_weight_1m.load(Ordering::Relaxed))
            .field("blocked_requests", &self.blocked_requests.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn header_sets_used_weight() {
        let tracker = RateLimitTracker::new();
        let mut headers = HeaderMap::new();
        headers.insert(USED_WEIGHT_HEADER, HeaderValue::from_static("420"));
        tracker.update_from_headers(&headers);
        assert_eq!(tracker.snapshot().used_weight_1m, 420);

        // Garbage is ignored.
        headers.insert(USED_WEIGHT_HEADER, HeaderValue::from_static("n/a"));
        tracker.update_from_headers(&headers);
        assert_eq!(tracker.snapshot().used_weight_1m, 420);
    }

    #[test]
    fn blocks_above_hard_limit_until_reset() {
        let tracker = RateLimitTracker::new();
        tracker.record_weight(995);
        assert!(tracker.try_acquire(5).is_ok());
        assert_eq!(tracker.try_acquire(10), Err(995));
        assert_eq!(tracker.snapshot().blocked_requests, 1);

        tracker.reset_1m_weight();
        assert!(tracker.try_acquire(10).is_ok());
    }
}
