//! Per-key token-bucket rate limiting.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Buckets beyond this count trigger a sweep of fully refilled ones.
const SWEEP_THRESHOLD: usize = 10_000;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub ok: bool,
    /// Time until the next token is available. Zero when `ok`.
    pub retry_after: Duration,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Consume one token from the bucket for `key`, allowing at most `limit`
    /// calls per `window` on average.
    async fn check(&self, key: &str, limit: u32, window: Duration) -> RateDecision;
}

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// In-process token buckets keyed by string. A new key starts with a full
/// bucket of `limit` tokens; tokens refill at `limit / window`.
#[derive(Debug, Default)]
pub struct TokenBucketLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl TokenBucketLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    async fn check_at(&self, key: &str, limit: u32, window: Duration, now: Instant) -> RateDecision {
        let capacity = f64::from(limit);
        let window_secs = window.as_secs_f64();
        let mut buckets = self.buckets.lock().await;

        if buckets.len() > SWEEP_THRESHOLD {
            buckets.retain(|_, b| now.duration_since(b.last_refill) < window);
        }

        let bucket = buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: capacity,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.last_refill = now;
        if window_secs > 0.0 {
            bucket.tokens = (bucket.tokens + elapsed / window_secs * capacity).min(capacity);
        } else {
            bucket.tokens = capacity;
        }

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            RateDecision {
                ok: true,
                retry_after: Duration::ZERO,
            }
        } else {
            let missing = 1.0 - bucket.tokens;
            let wait = if capacity > 0.0 {
                Duration::from_secs_f64(missing / capacity * window_secs)
            } else {
                window
            };
            RateDecision {
                ok: false,
                retry_after: wait,
            }
        }
    }
}

#[async_trait]
impl RateLimiter for TokenBucketLimiter {
    async fn check(&self, key: &str, limit: u32, window: Duration) -> RateDecision {
        self.check_at(key, limit, window, Instant::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_fresh_key_allows_full_burst() {
        let limiter = TokenBucketLimiter::new();
        let now = Instant::now();
        for _ in 0..10 {
            assert!(limiter.check_at("k", 10, MINUTE, now).await.ok);
        }
        let denied = limiter.check_at("k", 10, MINUTE, now).await;
        assert!(!denied.ok);
        assert!(denied.retry_after > Duration::ZERO);
        assert!(denied.retry_after <= Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = TokenBucketLimiter::new();
        let now = Instant::now();
        for _ in 0..6 {
            limiter.check_at("a", 6, MINUTE, now).await;
        }
        assert!(!limiter.check_at("a", 6, MINUTE, now).await.ok);
        assert!(limiter.check_at("b", 6, MINUTE, now).await.ok);
    }

    #[tokio::test]
    async fn test_tokens_refill_proportionally() {
        let limiter = TokenBucketLimiter::new();
        let start = Instant::now();
        for _ in 0..10 {
            limiter.check_at("k", 10, MINUTE, start).await;
        }
        assert!(!limiter.check_at("k", 10, MINUTE, start).await.ok);

        // 10 per minute refills one token every 6 seconds.
        let later = start + Duration::from_secs(6);
        assert!(limiter.check_at("k", 10, MINUTE, later).await.ok);
        assert!(!limiter.check_at("k", 10, MINUTE, later).await.ok);
    }

    #[tokio::test]
    async fn test_refill_caps_at_limit() {
        let limiter = TokenBucketLimiter::new();
        let start = Instant::now();
        limiter.check_at("k", 3, MINUTE, start).await;

        let much_later = start + Duration::from_secs(3600);
        for _ in 0..3 {
            assert!(limiter.check_at("k", 3, MINUTE, much_later).await.ok);
        }
        assert!(!limiter.check_at("k", 3, MINUTE, much_later).await.ok);
    }

    #[tokio::test]
    async fn test_zero_limit_always_denies() {
        let limiter = TokenBucketLimiter::new();
        let decision = limiter.check("k", 0, MINUTE).await;
        assert!(!decision.ok);
        assert_eq!(decision.retry_after, MINUTE);
    }
}
