//! `/v1/store`, `/healthz`, `/metrics` handlers (spec.md 4.9).

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use crate::core::model::RemoteStore;
use crate::error::{Error, TransportError};

use super::Shared;

/// Echo `X-Request-Id` if present and non-empty, else mint one (spec.md 4.8's
/// request-id contract, reused here for consistency across both servers).
pub fn request_id<B>(req: &Request<B>) -> String {
    req.headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

pub fn error_body(err: &Error, request_id: &str) -> serde_json::Value {
    json!({
        "error": err.error_code(),
        "message": err.to_string(),
        "request_id": request_id,
    })
}

fn error_response(err: Error, request_id: &str) -> Response {
    (err.status_code(), Json(error_body(&err, request_id))).into_response()
}

pub async fn healthz() -> Response {
    (StatusCode::OK, Json(json!({"ok": true}))).into_response()
}

pub async fn metrics_text(State(state): State<Shared>) -> Response {
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
        .into_response()
}

pub async fn get_store(State(state): State<Shared>) -> Response {
    let store = state.store.load().await;
    (
        StatusCode::OK,
        [("ETag", store.revision.to_string())],
        Json(store),
    )
        .into_response()
}

pub async fn put_store(
    State(state): State<Shared>,
    headers: HeaderMap,
    req: Request<Body>,
) -> Response {
    let rid = request_id(&req);

    let Some(if_match) = headers.get("If-Match").and_then(|v| v.to_str().ok()) else {
        return error_response(crate::error::CloudError::PreconditionRequired.into(), &rid);
    };
    let Ok(expected_revision) = if_match.parse::<u64>() else {
        return error_response(
            TransportError::BadRequest("If-Match must be an integer revision".into()).into(),
            &rid,
        );
    };

    let body = req.into_body();
    let bytes = match axum::body::to_bytes(body, 10 * 1024 * 1024).await {
        Ok(b) => b,
        Err(_) => return error_response(TransportError::PayloadTooLarge.into(), &rid),
    };
    let incoming: RemoteStore = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(e) => {
            return error_response(
                TransportError::BadRequest(format!("malformed request body: {e}")).into(),
                &rid,
            )
        }
    };

    match state.store.save(incoming, expected_revision).await {
        Ok(saved) => (
            StatusCode::OK,
            [("ETag", saved.revision.to_string())],
            Json(saved),
        )
            .into_response(),
        Err(e) => error_response(e, &rid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_shape() {
        let err: Error = TransportError::RevisionConflict { expected: 1, got: 2 }.into();
        let body = error_body(&err, "req-1");
        assert_eq!(body["error"], "conflict");
        assert_eq!(body["request_id"], "req-1");
    }
}
