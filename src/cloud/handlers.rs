//! Cloud service HTTP handlers (spec.md 4.8).

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::core::model::{RemoteStore, Role};
use crate::error::{AuthError, CloudError, Error, TransportError};

use super::auth::Identity;
use super::db::CloudDb;
use super::models::{AuditEvent, User};
use super::owner::{self, OwnerParams};
use super::tokens;
use super::Shared;

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

/// Outermost layer: attaches `X-Request-Id` to every response, echoing the
/// inbound header if present.
pub async fn request_id_middleware(req: Request<Body>, next: Next) -> Response {
    let rid = request_id(&req);
    let mut resp = next.run(req).await;
    if let Ok(value) = rid.parse() {
        resp.headers_mut().insert("x-request-id", value);
    }
    resp
}

/// Per-IP sliding-window rate limiting; `/healthz` is exempt (spec.md 4.8).
pub async fn rate_limit_middleware(
    State(state): State<Shared>,
    headers: HeaderMap,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.uri().path() == "/healthz" {
        return next.run(req).await.into_response();
    }
    let ip = client_ip(&headers);
    if state.rate_limiter.check(ip).await {
        next.run(req).await.into_response()
    } else {
        let rid = request_id(&req);
        error_response(AuthError::RateLimited.into(), &rid)
    }
}

fn client_ip(headers: &HeaderMap) -> std::net::IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED))
}

/// Authenticates the bearer token and attaches an [`Identity`] extension.
/// `/healthz` requires no authentication.
pub async fn auth_middleware(
    State(state): State<Shared>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if req.uri().path() == "/healthz" {
        return next.run(req).await.into_response();
    }

    let rid = request_id(&req);
    let Some(bearer) = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
    else {
        return error_response(AuthError::Unauthorized.into(), &rid);
    };

    match super::auth::authenticate(&state.config, state.db.as_ref(), &bearer).await {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await.into_response()
        }
        Err(e) => error_response(e, &rid),
    }
}

pub async fn healthz() -> Response {
    (StatusCode::OK, Json(json!({"ok": true}))).into_response()
}

#[derive(Serialize)]
struct MeResponse {
    user: User,
    organizations: Vec<serde_json::Value>,
    teams: Vec<serde_json::Value>,
}

pub async fn me(Extension(identity): Extension<Identity>) -> Response {
    (
        StatusCode::OK,
        Json(MeResponse {
            user: User {
                id: identity.user_id,
                email: identity.email,
            },
            organizations: Vec::new(),
            teams: Vec::new(),
        }),
    )
        .into_response()
}

#[derive(Deserialize)]
pub struct StoreQuery {
    pub project: Option<String>,
    pub organization_id: Option<String>,
    pub team_id: Option<String>,
}

fn require_scope(identity: &Identity, scope: &str, rid: &str) -> std::result::Result<(), Response> {
    if identity.has_scope(scope) {
        Ok(())
    } else {
        Err(error_response(AuthError::ForbiddenScope(scope.into()).into(), rid))
    }
}

pub async fn get_store(
    State(state): State<Shared>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<StoreQuery>,
    req: Request<Body>,
) -> Response {
    let rid = request_id(&req);
    if let Err(resp) = require_scope(&identity, "store:read", &rid) {
        return resp;
    }

    let project = match owner::normalize_project(query.project.as_deref()) {
        Ok(p) => p,
        Err(e) => return error_response(e, &rid),
    };
    let params = OwnerParams {
        organization_id: query.organization_id,
        team_id: query.team_id,
    };
    let owner_key = match owner::resolve_owner_key(state.db.as_ref(), identity.user_id, &params, Role::Reader).await {
        Ok(k) => k,
        Err(e) => return error_response(e, &rid),
    };

    match state.db.load_snapshot(&owner_key, &project).await {
        Ok(Some(snapshot)) => (
            StatusCode::OK,
            [("ETag", snapshot.revision.to_string())],
            Json(snapshot.store),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::OK,
            [("ETag", "0".to_string())],
            Json(RemoteStore::default()),
        )
            .into_response(),
        Err(e) => error_response(e, &rid),
    }
}

pub async fn put_store(
    State(state): State<Shared>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<StoreQuery>,
    headers: HeaderMap,
    req: Request<Body>,
) -> Response {
    let rid = request_id(&req);
    if let Err(resp) = require_scope(&identity, "store:write", &rid) {
        return resp;
    }

    let project = match owner::normalize_project(query.project.as_deref()) {
        Ok(p) => p,
        Err(e) => return error_response(e, &rid),
    };
    let params = OwnerParams {
        organization_id: query.organization_id,
        team_id: query.team_id,
    };
    let owner_key =
        match owner::resolve_owner_key(state.db.as_ref(), identity.user_id, &params, Role::Maintainer).await {
            Ok(k) => k,
            Err(e) => return error_response(e, &rid),
        };

    let Some(if_match) = headers.get("If-Match").and_then(|v| v.to_str().ok()) else {
        return error_response(CloudError::PreconditionRequired.into(), &rid);
    };
    let Ok(expected_revision) = if_match.parse::<u64>() else {
        return error_response(
            TransportError::BadRequest("If-Match must be an integer revision".into()).into(),
            &rid,
        );
    };

    let body = req.into_body();
    let bytes = match axum::body::to_bytes(body, state.config.max_body_bytes).await {
        Ok(b) => b,
        Err(_) => return error_response(CloudError::PayloadTooLarge.into(), &rid),
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

    match state
        .db
        .save_snapshot(&owner_key, &project, expected_revision, incoming)
        .await
    {
        Ok(snapshot) => {
            let _ = state
                .db
                .append_audit_event(AuditEvent {
                    id: Uuid::new_v4(),
                    actor: identity.email.clone(),
                    action: "store_put".into(),
                    owner_key: owner_key.clone(),
                    project: project.clone(),
                    metadata: json!({"revision": snapshot.revision}),
                    created_at: Utc::now(),
                })
                .await;
            (
                StatusCode::OK,
                [("ETag", snapshot.revision.to_string())],
                Json(snapshot.store),
            )
                .into_response()
        }
        Err(e) => error_response(e, &rid),
    }
}

#[derive(Deserialize)]
pub struct CreateTokenRequest {
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct CreateTokenResponse {
    pub id: Uuid,
    pub token: String,
    pub token_prefix: String,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub async fn create_token(
    State(state): State<Shared>,
    Extension(identity): Extension<Identity>,
    req: Request<Body>,
) -> Response {
    let rid = request_id(&req);
    if let Err(resp) = require_scope(&identity, "tokens:write", &rid) {
        return resp;
    }
    let Some(pepper) = state.config.pat_pepper.as_deref() else {
        return error_response(CloudError::PatDisabled.into(), &rid);
    };

    let bytes = match axum::body::to_bytes(req.into_body(), state.config.max_body_bytes).await {
        Ok(b) => b,
        Err(_) => return error_response(CloudError::PayloadTooLarge.into(), &rid),
    };
    let body: CreateTokenRequest = match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(e) => {
            return error_response(
                TransportError::BadRequest(format!("malformed request body: {e}")).into(),
                &rid,
            )
        }
    };

    let issued = match tokens::issue(identity.user_id, body.scopes, body.expires_at, pepper) {
        Ok(i) => i,
        Err(e) => return error_response(e, &rid),
    };
    if let Err(e) = state.db.insert_pat(issued.record.clone()).await {
        return error_response(e, &rid);
    }

    (
        StatusCode::OK,
        Json(CreateTokenResponse {
            id: issued.record.id,
            token: issued.raw,
            token_prefix: issued.record.prefix,
            scopes: issued.record.scopes,
            expires_at: issued.record.expires_at,
        }),
    )
        .into_response()
}

pub async fn revoke_token(
    State(state): State<Shared>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    req: Request<Body>,
) -> Response {
    let rid = request_id(&req);
    if let Err(resp) = require_scope(&identity, "tokens:write", &rid) {
        return resp;
    }
    match state.db.revoke_pat(id, identity.user_id).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e, &rid),
    }
}
