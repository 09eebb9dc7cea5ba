//! Self-host server auth modes (spec.md 4.9): `off`, `token`, `header`,
//! `token_or_header`.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::error::{AuthError, Error, Result};

use super::Shared;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMode {
    Off,
    Token,
    Header,
    TokenOrHeader,
}

impl AuthMode {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "off" => Ok(AuthMode::Off),
            "token" => Ok(AuthMode::Token),
            "header" => Ok(AuthMode::Header),
            "token_or_header" => Ok(AuthMode::TokenOrHeader),
            other => Err(Error::Other(format!(
                "invalid auth mode '{other}': expected off, token, header, or token_or_header"
            ))),
        }
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn check_token(state: &Shared, req: &Request<Body>) -> bool {
    let Some(expected) = state.config.token.as_deref() else {
        return false;
    };
    let Some(header) = req.headers().get(axum::http::header::AUTHORIZATION) else {
        return false;
    };
    let Ok(value) = header.to_str() else {
        return false;
    };
    match value.strip_prefix("Bearer ") {
        Some(presented) => constant_time_eq(presented, expected),
        None => false,
    }
}

fn check_header(state: &Shared, req: &Request<Body>) -> bool {
    let (Some(header_name), Some(secret)) = (
        state.config.auth_header.as_deref(),
        state.config.auth_proxy_secret.as_deref(),
    ) else {
        return false;
    };
    let proxy_value_present = req
        .headers()
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| !v.is_empty());
    let secret_matches = req
        .headers()
        .get("x-envsync-proxy-secret")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|presented| constant_time_eq(presented, secret));
    proxy_value_present && secret_matches
}

/// Gate `/v1/store`; `/healthz` and `/metrics` are always open.
pub async fn auth_middleware(
    State(state): State<Shared>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.uri().path() != "/v1/store" {
        return next.run(req).await.into_response();
    }

    let authorized = match state.config.auth_mode {
        AuthMode::Off => true,
        AuthMode::Token => check_token(&state, &req),
        AuthMode::Header => check_header(&state, &req),
        AuthMode::TokenOrHeader => check_token(&state, &req) || check_header(&state, &req),
    };

    if authorized {
        next.run(req).await.into_response()
    } else {
        state.metrics.record_unauthorized();
        let err: Error = AuthError::Unauthorized.into();
        (
            StatusCode::UNAUTHORIZED,
            axum::Json(super::handlers::error_body(&err, &super::handlers::request_id(&req))),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_modes() {
        assert_eq!(AuthMode::parse("off").unwrap(), AuthMode::Off);
        assert_eq!(AuthMode::parse("token").unwrap(), AuthMode::Token);
        assert_eq!(AuthMode::parse("header").unwrap(), AuthMode::Header);
        assert_eq!(AuthMode::parse("token_or_header").unwrap(), AuthMode::TokenOrHeader);
        assert!(AuthMode::parse("bogus").is_err());
    }

    #[test]
    fn constant_time_eq_matches_equal_strings() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
    }
}
