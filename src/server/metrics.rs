//! `GET /metrics` (text/Prometheus-style): total requests, 2xx/4xx/5xx,
//! rate-limited, unauthorized counters (spec.md 4.9).

use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::Shared;

#[derive(Default)]
pub struct Metrics {
    total: AtomicU64,
    status_2xx: AtomicU64,
    status_4xx: AtomicU64,
    status_5xx: AtomicU64,
    rate_limited: AtomicU64,
    unauthorized: AtomicU64,
}

impl Metrics {
    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unauthorized(&self) {
        self.unauthorized.fetch_add(1, Ordering::Relaxed);
    }

    fn record_status(&self, status: u16) {
        self.total.fetch_add(1, Ordering::Relaxed);
        match status {
            200..=299 => self.status_2xx.fetch_add(1, Ordering::Relaxed),
            400..=499 => self.status_4xx.fetch_add(1, Ordering::Relaxed),
            500..=599 => self.status_5xx.fetch_add(1, Ordering::Relaxed),
            _ => 0,
        };
    }

    pub fn render(&self) -> String {
        format!(
            "# HELP envsync_server_requests_total Total HTTP requests.\n\
             # TYPE envsync_server_requests_total counter\n\
             envsync_server_requests_total {}\n\
             # HELP envsync_server_responses_total Responses by status class.\n\
             # TYPE envsync_server_responses_total counter\n\
             envsync_server_responses_total{{class=\"2xx\"}} {}\n\
             envsync_server_responses_total{{class=\"4xx\"}} {}\n\
             envsync_server_responses_total{{class=\"5xx\"}} {}\n\
             # HELP envsync_server_rate_limited_total Requests rejected by the rate limiter.\n\
             # TYPE envsync_server_rate_limited_total counter\n\
             envsync_server_rate_limited_total {}\n\
             # HELP envsync_server_unauthorized_total Requests rejected by auth.\n\
             # TYPE envsync_server_unauthorized_total counter\n\
             envsync_server_unauthorized_total {}\n",
            self.total.load(Ordering::Relaxed),
            self.status_2xx.load(Ordering::Relaxed),
            self.status_4xx.load(Ordering::Relaxed),
            self.status_5xx.load(Ordering::Relaxed),
            self.rate_limited.load(Ordering::Relaxed),
            self.unauthorized.load(Ordering::Relaxed),
        )
    }
}

/// Outermost layer: records every response's status class, including ones
/// rejected earlier by the auth/rate-limit middleware layers.
pub async fn observe_middleware(State(state): State<Shared>, req: Request<Body>, next: Next) -> Response {
    let resp = next.run(req).await;
    state.metrics.record_status(resp.status().as_u16());
    resp
}
