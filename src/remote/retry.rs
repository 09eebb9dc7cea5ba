//! Retry policy for the HTTP and cloud transports (spec.md 4.4.2).
//!
//! Exponential backoff with jitter, an injectable sleep function so tests
//! can run the policy without wall-clock delay, and a deadline so callers'
//! cancellation propagates into the loop (spec.md 5).

use std::time::{Duration, Instant};

use rand::Rng;

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryConfig {
    pub fn from_env() -> Self {
        RetryConfig {
            max_attempts: env_u32("ENVSYNC_REMOTE_RETRY_MAX_ATTEMPTS", 3),
            base_delay: env_duration_ms("ENVSYNC_REMOTE_RETRY_BASE_DELAY", 200),
            max_delay: env_duration_ms("ENVSYNC_REMOTE_RETRY_MAX_DELAY", 2000),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Accepts either a plain millisecond integer or a `<n>ms`/`<n>s` suffix.
fn env_duration_ms(name: &str, default_ms: u64) -> Duration {
    match std::env::var(name) {
        Ok(raw) => parse_duration_ms(&raw).unwrap_or(Duration::from_millis(default_ms)),
        Err(_) => Duration::from_millis(default_ms),
    }
}

fn parse_duration_ms(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(n) = s.strip_suffix("ms") {
        return n.parse::<u64>().ok().map(Duration::from_millis);
    }
    if let Some(n) = s.strip_suffix('s') {
        return n.parse::<f64>().ok().map(Duration::from_secs_f64);
    }
    s.parse::<u64>().ok().map(Duration::from_millis)
}

/// An injectable sleep function, so the retry loop is testable without
/// real wall-clock delay (spec.md 5, "suspension points").
pub trait Sleeper {
    fn sleep(&self, d: Duration);
}

pub struct RealSleeper;
impl Sleeper for RealSleeper {
    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

/// Backoff for attempt `i` (1-indexed): `base * 2^(i-1)`, clamped to
/// `max_delay`, plus uniform jitter in `[0, delay/2]`.
fn backoff(cfg: &RetryConfig, attempt: u32) -> Duration {
    let exp = cfg.base_delay.saturating_mul(1u32 << (attempt - 1).min(31));
    let capped = exp.min(cfg.max_delay);
    let jitter_frac: f64 = rand::thread_rng().gen_range(0.0..0.5);
    capped + Duration::from_secs_f64(capped.as_secs_f64() * jitter_frac)
}

/// Run `op`, retrying on retryable errors up to `cfg.max_attempts` times
/// total, with exponential backoff + jitter between attempts. Aborts (does
/// not retry) once `deadline` has passed.
pub fn with_retry<T>(
    cfg: &RetryConfig,
    sleeper: &dyn Sleeper,
    deadline: Option<Instant>,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut attempt = 1;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) => {
                let exhausted = attempt >= cfg.max_attempts;
                let past_deadline = deadline.is_some_and(|d| Instant::now() >= d);
                if exhausted || past_deadline || !is_retryable(&e) {
                    return Err(e);
                }
                sleeper.sleep(backoff(cfg, attempt));
                attempt += 1;
            }
        }
    }
}

fn is_retryable(e: &Error) -> bool {
    e.is_retryable()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use std::cell::RefCell;

    struct RecordingSleeper {
        delays: RefCell<Vec<Duration>>,
    }
    impl Sleeper for RecordingSleeper {
        fn sleep(&self, d: Duration) {
            self.delays.borrow_mut().push(d);
        }
    }

    #[test]
    fn succeeds_after_k_retryable_failures() {
        let cfg = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(1000),
        };
        let sleeper = RecordingSleeper {
            delays: RefCell::new(Vec::new()),
        };
        let mut calls = 0;
        let result = with_retry(&cfg, &sleeper, None, || {
            calls += 1;
            if calls < 3 {
                Err(TransportError::Retryable("boom".into()).into())
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 3);
        let delays = sleeper.delays.borrow();
        assert_eq!(delays.len(), 2);
        assert!(delays[0] >= Duration::from_millis(10));
        assert!(delays[1] >= delays[0]);
    }

    #[test]
    fn never_retries_fatal_errors() {
        let cfg = RetryConfig::default();
        let sleeper = RecordingSleeper {
            delays: RefCell::new(Vec::new()),
        };
        let mut calls = 0;
        let result: Result<()> = with_retry(&cfg, &sleeper, None, || {
            calls += 1;
            Err(TransportError::Fatal("bad request".into()).into())
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
        assert!(sleeper.delays.borrow().is_empty());
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let cfg = RetryConfig {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
        };
        let sleeper = RecordingSleeper {
            delays: RefCell::new(Vec::new()),
        };
        let mut calls = 0;
        let result: Result<()> = with_retry(&cfg, &sleeper, None, || {
            calls += 1;
            Err(TransportError::Retryable("still down".into()).into())
        });
        assert!(result.is_err());
        assert_eq!(calls, 2);
    }
}
