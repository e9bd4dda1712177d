// [apps/gateway/src/ratelimit.rs]
//! Per-principal token-bucket rate limiting. One bucket per
//! `(principal_id, endpoint_class)` pair, refilled continuously at
//! `limit_per_minute / 60` tokens per second and capped at `limit_per_minute`.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

pub struct RateLimiter {
    limit_per_minute: u32,
    buckets: RwLock<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(limit_per_minute: u32) -> Self {
        Self {
            limit_per_minute,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    fn key(principal_id: &str, endpoint_class: &str) -> String {
        format!("{principal_id}:{endpoint_class}")
    }

    /// Returns `true` if a token was available and consumed, `false` if the
    /// principal is over budget for this endpoint class.
    pub fn try_acquire(&self, principal_id: &str, endpoint_class: &str) -> bool {
        if self.limit_per_minute == 0 {
            return true;
        }
        let key = Self::key(principal_id, endpoint_class);
        let now = Instant::now();
        let refill_rate_per_sec = self.limit_per_minute as f64 / 60.0;
        let capacity = self.limit_per_minute as f64;

        let mut buckets = self.buckets.write().expect("rate limiter lock poisoned");
        let bucket = buckets.entry(key).or_insert_with(|| Bucket {
            tokens: capacity,
            last_refill: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * refill_rate_per_sec).min(capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drops buckets untouched for longer than `idle_for`; run periodically
    /// so the map doesn't grow unbounded across the lifetime of the process.
    pub fn sweep_idle(&self, idle_for: Duration) {
        let now = Instant::now();
        let mut buckets = self.buckets.write().expect("rate limiter lock poisoned");
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < idle_for);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausts_then_refuses() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.try_acquire("user-1", "nlp"));
        assert!(limiter.try_acquire("user-1", "nlp"));
        assert!(!limiter.try_acquire("user-1", "nlp"));
    }

    #[test]
    fn buckets_are_independent_per_endpoint_class() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.try_acquire("user-1", "nlp"));
        assert!(limiter.try_acquire("user-1", "commands"));
    }

    #[test]
    fn buckets_are_independent_per_principal() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.try_acquire("user-1", "nlp"));
        assert!(limiter.try_acquire("user-2", "nlp"));
    }
}
