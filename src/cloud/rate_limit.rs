//! Sliding 60s window rate limiter, keyed by client IP (spec.md 4.8, "Rate
//! limiting"). Deliberately a different algorithm from the self-host
//! server's token bucket (`server::rate_limit`): capacity is `rpm + burst`,
//! and the window slides rather than refilling continuously.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

#[derive(Default)]
struct Window {
    hits: VecDeque<Instant>,
}

pub struct SlidingWindowLimiter {
    windows: Mutex<HashMap<IpAddr, Window>>,
    capacity: u32,
}

const WINDOW: Duration = Duration::from_secs(60);

impl SlidingWindowLimiter {
    pub fn new(rpm: u32, burst: u32) -> Self {
        SlidingWindowLimiter {
            windows: Mutex::new(HashMap::new()),
            capacity: rpm + burst,
        }
    }

    pub async fn check(&self, ip: IpAddr) -> bool {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();
        let window = windows.entry(ip).or_default();
        while let Some(front) = window.hits.front() {
            if now.duration_since(*front) > WINDOW {
                window.hits.pop_front();
            } else {
                break;
            }
        }
        if window.hits.len() as u32 >= self.capacity {
            false
        } else {
            window.hits.push_back(now);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exhausts_after_capacity_hits() {
        let limiter = SlidingWindowLimiter::new(2, 0);
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        assert!(limiter.check(ip).await);
        assert!(limiter.check(ip).await);
        assert!(!limiter.check(ip).await);
    }

    #[tokio::test]
    async fn different_ips_have_independent_windows() {
        let limiter = SlidingWindowLimiter::new(1, 0);
        let a: IpAddr = "127.0.0.1".parse().unwrap();
        let b: IpAddr = "127.0.0.2".parse().unwrap();
        assert!(limiter.check(a).await);
        assert!(limiter.check(b).await);
    }
}
