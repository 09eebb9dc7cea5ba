//! Cloud control plane (C8): multi-tenant store behind PAT/dev-token/OIDC
//! auth, owner-scoped by user/org/team, used by the `envsync-cloud` binary.

pub mod auth;
pub mod config;
pub mod db;
pub mod handlers;
pub mod models;
pub mod owner;
pub mod rate_limit;
pub mod tokens;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use config::CloudConfig;

use db::CloudDb;

pub struct AppState {
    pub config: CloudConfig,
    pub db: Box<dyn CloudDb>,
    pub rate_limiter: rate_limit::SlidingWindowLimiter,
}

pub type Shared = Arc<AppState>;

pub fn build_state(config: CloudConfig, db: Box<dyn CloudDb>) -> Shared {
    Arc::new(AppState {
        rate_limiter: rate_limit::SlidingWindowLimiter::new(config.rate_limit_rpm, config.rate_limit_burst),
        config,
        db,
    })
}

pub fn router(state: Shared) -> Router {
    Router::new()
        .route("/v1/me", get(handlers::me))
        .route("/v1/store", get(handlers::get_store).put(handlers::put_store))
        .route("/v1/tokens", post(handlers::create_token))
        .route("/v1/tokens/:id", axum::routing::delete(handlers::revoke_token))
        .route_layer(middleware::from_fn_with_state(state.clone(), handlers::auth_middleware))
        .route("/healthz", get(handlers::healthz))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn(handlers::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Construct the `Box<dyn CloudDb>` selected by configuration: in-memory
/// unless a Postgres URL is given (spec.md 4.8, "Store writes"; SPEC_FULL.md
/// A, `ENVSYNC_CLOUD_INMEMORY`).
pub async fn open_db(config: &CloudConfig) -> crate::error::Result<Box<dyn CloudDb>> {
    if config.in_memory {
        return Ok(Box::new(db::memory::InMemoryDb::new()));
    }

    #[cfg(feature = "postgres")]
    {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| crate::error::Error::Other("ENVSYNC_CLOUD_DATABASE_URL is required".into()))?;
        let pg = db::postgres::PostgresDb::connect(url).await?;
        pg.migrate().await?;
        return Ok(Box::new(pg));
    }

    #[cfg(not(feature = "postgres"))]
    {
        Err(crate::error::Error::Other(
            "Postgres support was not compiled in; set ENVSYNC_CLOUD_INMEMORY=true".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_config() -> CloudConfig {
        CloudConfig {
            addr: "127.0.0.1:0".parse().unwrap(),
            database_url: None,
            in_memory: true,
            pat_pepper: None,
            dev_token: Some("devtok".into()),
            jwt_issuer: None,
            jwt_audience: None,
            jwt_skip_aud_check: false,
            jwt_public_key_pem: None,
            rate_limit_rpm: 600,
            rate_limit_burst: 50,
            max_body_bytes: 1_048_576,
        }
    }

    #[tokio::test]
    async fn healthz_requires_no_auth() {
        let state = build_state(test_config(), Box::new(db::memory::InMemoryDb::new()));
        let app = router(state);
        let resp = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn store_requires_auth() {
        let state = build_state(test_config(), Box::new(db::memory::InMemoryDb::new()));
        let app = router(state);
        let resp = app
            .oneshot(Request::builder().uri("/v1/store").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn store_round_trips_with_dev_token() {
        let state = build_state(test_config(), Box::new(db::memory::InMemoryDb::new()));
        let app = router(state);

        let get_resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/store")
                    .header("authorization", "Bearer devtok")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(get_resp.status(), StatusCode::OK);

        let put_resp = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/v1/store")
                    .header("authorization", "Bearer devtok")
                    .header("if-match", "0")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&crate::core::model::RemoteStore::default()).unwrap(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(put_resp.status(), StatusCode::OK);
    }
}
