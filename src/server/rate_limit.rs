//! In-memory per-IP token bucket rate limiter for `/v1/store` (spec.md 4.9).
//!
//! Grounded on the citadel-api example's `RateLimiter`/`TokenBucket` pair,
//! generalized with an explicit idle-bucket sweep interval derived from
//! capacity and refill rate rather than a fixed 300s cutoff.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::Mutex;

use crate::error::{AuthError, Error};

use super::Shared;

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Clone)]
pub struct TokenBucketLimiter {
    inner: Arc<Inner>,
}

struct Inner {
    buckets: Mutex<HashMap<IpAddr, TokenBucket>>,
    rate_per_sec: f64,
    capacity: f64,
    idle_after: Duration,
}

impl TokenBucketLimiter {
    /// `rpm` requests/minute, `burst` bucket capacity. Capacity is
    /// `max(1, burst)`; refill rate is `rpm/60` per second.
    pub fn new(rpm: u32, burst: u32) -> Self {
        let rate_per_sec = rpm as f64 / 60.0;
        let capacity = (burst.max(1)) as f64;
        let idle_after = Duration::from_secs_f64(if rate_per_sec > 0.0 {
            (capacity / rate_per_sec) * 2.0
        } else {
            600.0
        });
        TokenBucketLimiter {
            inner: Arc::new(Inner {
                buckets: Mutex::new(HashMap::new()),
                rate_per_sec,
                capacity,
                idle_after,
            }),
        }
    }

    async fn check(&self, ip: IpAddr) -> bool {
        let mut buckets = self.inner.buckets.lock().await;
        let now = Instant::now();
        let bucket = buckets.entry(ip).or_insert_with(|| TokenBucket {
            tokens: self.inner.capacity,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.inner.rate_per_sec).min(self.inner.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    async fn sweep(&self) {
        let mut buckets = self.inner.buckets.lock().await;
        let now = Instant::now();
        let idle_after = self.inner.idle_after;
        buckets.retain(|_, bucket| now.duration_since(bucket.last_refill) < idle_after);
    }
}

/// Only `/v1/store` is rate-limited (spec.md 4.9).
pub async fn rate_limit_middleware(
    State(state): State<Shared>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.uri().path() != "/v1/store" {
        return next.run(req).await.into_response();
    }

    if state.limiter.check(addr.ip()).await {
        next.run(req).await.into_response()
    } else {
        state.metrics.record_rate_limited();
        let err: Error = AuthError::RateLimited.into();
        (
            StatusCode::TOO_MANY_REQUESTS,
            axum::Json(super::handlers::error_body(&err, &super::handlers::request_id(&req))),
        )
            .into_response()
    }
}

/// Periodic idle-bucket eviction, spawned once at startup against the same
/// `Arc` the router's middleware holds.
pub async fn sweep_loop(limiter: TokenBucketLimiter) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        limiter.sweep().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exhausts_then_refills() {
        let limiter = TokenBucketLimiter::new(60, 2);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert!(limiter.check(ip).await);
        assert!(limiter.check(ip).await);
        assert!(!limiter.check(ip).await);
    }

    #[tokio::test]
    async fn sweep_evicts_idle_buckets() {
        let limiter = TokenBucketLimiter::new(6000, 1);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        limiter.check(ip).await;
        {
            let mut buckets = limiter.inner.buckets.lock().await;
            let bucket = buckets.get_mut(&ip).unwrap();
            bucket.last_refill -= Duration::from_secs(3600);
        }
        limiter.sweep().await;
        assert!(!limiter.inner.buckets.lock().await.contains_key(&ip));
    }
}
