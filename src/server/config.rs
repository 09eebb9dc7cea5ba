//! `envsync-server` configuration, loaded entirely from the environment
//! (spec.md 4.9, 6).

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{Error, Result};

use super::auth::AuthMode;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub store_path: PathBuf,
    pub token: Option<String>,
    pub auth_mode: AuthMode,
    pub auth_header: Option<String>,
    pub auth_proxy_secret: Option<String>,
    pub rate_limit_rpm: u32,
    pub rate_limit_burst: u32,
}

impl ServerConfig {
    /// `ENVSYNC_SERVER_ADDR` (default `0.0.0.0:8787`), `ENVSYNC_SERVER_STORE`
    /// (default `~/.config/envsync/server_store.json`), `ENVSYNC_SERVER_TOKEN`,
    /// `ENVSYNC_SERVER_AUTH_MODE` (`off|token|header|token_or_header`, default
    /// `token` when a token is configured else `off`), `ENVSYNC_SERVER_AUTH_HEADER`,
    /// `ENVSYNC_SERVER_AUTH_PROXY_SECRET`, `ENVSYNC_SERVER_RATE_LIMIT_RPM`
    /// (default 600), `ENVSYNC_SERVER_RATE_LIMIT_BURST` (default 50).
    pub fn from_env() -> Result<Self> {
        let addr: SocketAddr = std::env::var("ENVSYNC_SERVER_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8787".into())
            .parse()
            .map_err(|e| crate::error::Error::Other(format!("invalid ENVSYNC_SERVER_ADDR: {e}")))?;

        let store_path = match std::env::var("ENVSYNC_SERVER_STORE") {
            Ok(p) => PathBuf::from(p),
            Err(_) => crate::core::state::config_dir()?.join("server_store.json"),
        };

        let token = std::env::var("ENVSYNC_SERVER_TOKEN").ok().filter(|t| !t.is_empty());
        let auth_header = std::env::var("ENVSYNC_SERVER_AUTH_HEADER").ok().filter(|h| !h.is_empty());
        let auth_proxy_secret =
            std::env::var("ENVSYNC_SERVER_AUTH_PROXY_SECRET").ok().filter(|s| !s.is_empty());

        let auth_mode = match std::env::var("ENVSYNC_SERVER_AUTH_MODE") {
            Ok(raw) => AuthMode::parse(&raw)?,
            Err(_) => {
                if token.is_some() {
                    AuthMode::Token
                } else {
                    AuthMode::Off
                }
            }
        };
        if matches!(auth_mode, AuthMode::Token | AuthMode::TokenOrHeader) && token.is_none() {
            return Err(Error::Other(
                "ENVSYNC_SERVER_AUTH_MODE requires ENVSYNC_SERVER_TOKEN to be set".into(),
            ));
        }

        let rate_limit_rpm = std::env::var("ENVSYNC_SERVER_RATE_LIMIT_RPM")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(600);
        let rate_limit_burst = std::env::var("ENVSYNC_SERVER_RATE_LIMIT_BURST")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(50);

        Ok(ServerConfig {
            addr,
            store_path,
            token,
            auth_mode,
            auth_header,
            auth_proxy_secret,
            rate_limit_rpm,
            rate_limit_burst,
        })
    }
}
