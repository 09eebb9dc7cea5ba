//! Self-host HTTP server (C9): a single-blob, revisioned `RemoteStore`
//! exposed over the same `GET/PUT /v1/store` contract the HTTP remote
//! transport speaks, with token/header auth and per-IP rate limiting
//! (spec.md 4.9).

pub mod auth;
pub mod config;
pub mod handlers;
pub mod metrics;
pub mod rate_limit;
pub mod store;

use std::sync::Arc;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;

/// Shared server state, cloned (cheaply, via `Arc`) into every handler.
pub struct AppState {
    pub config: ServerConfig,
    pub store: store::Store,
    pub limiter: rate_limit::TokenBucketLimiter,
    pub metrics: metrics::Metrics,
}

pub type Shared = Arc<AppState>;

pub fn build_state(config: ServerConfig) -> Shared {
    Arc::new(AppState {
        store: store::Store::open(config.store_path.clone()),
        limiter: rate_limit::TokenBucketLimiter::new(config.rate_limit_rpm, config.rate_limit_burst),
        metrics: metrics::Metrics::default(),
        config,
    })
}

/// Build the axum router over already-constructed state, so integration
/// tests and `envsync-server`'s `main` can drive the same router and share
/// the same `Arc` for the rate-limiter sweep task.
pub fn router(state: Shared) -> Router {
    Router::new()
        .route("/v1/store", get(handlers::get_store).put(handlers::put_store))
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics_text))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            metrics::observe_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve forever. Also spawns the idle rate-limiter bucket sweep
/// (spec.md 4.9, "A periodic sweep evicts idle buckets").
pub async fn run(config: ServerConfig) -> std::io::Result<()> {
    let addr = config.addr;
    let state = build_state(config);
    tokio::spawn(rate_limit::sweep_loop(state.limiter.clone()));

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "envsync-server listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
}
