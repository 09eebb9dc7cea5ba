//! `envsync-cloud` configuration (spec.md 4.8, 6).

use std::net::SocketAddr;

use crate::error::Result;

#[derive(Clone, Debug)]
pub struct CloudConfig {
    pub addr: SocketAddr,
    pub database_url: Option<String>,
    pub in_memory: bool,
    pub pat_pepper: Option<String>,
    pub dev_token: Option<String>,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,
    pub jwt_skip_aud_check: bool,
    pub jwt_public_key_pem: Option<String>,
    pub rate_limit_rpm: u32,
    pub rate_limit_burst: u32,
    pub max_body_bytes: usize,
}

impl CloudConfig {
    pub fn from_env() -> Result<Self> {
        let addr: SocketAddr = std::env::var("ENVSYNC_CLOUD_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8788".into())
            .parse()
            .map_err(|e| crate::error::Error::Other(format!("invalid ENVSYNC_CLOUD_ADDR: {e}")))?;

        let database_url = std::env::var("ENVSYNC_CLOUD_DATABASE_URL").ok();
        let in_memory = std::env::var("ENVSYNC_CLOUD_INMEMORY")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(database_url.is_none());

        let pat_pepper = std::env::var("ENVSYNC_CLOUD_PAT_PEPPER").ok().filter(|p| !p.is_empty());
        let dev_token = std::env::var("ENVSYNC_CLOUD_DEV_TOKEN").ok().filter(|t| !t.is_empty());
        let jwt_issuer = std::env::var("ENVSYNC_CLOUD_JWT_ISSUER").ok();
        let jwt_audience = std::env::var("ENVSYNC_CLOUD_JWT_AUDIENCE").ok();
        let jwt_skip_aud_check = std::env::var("ENVSYNC_CLOUD_JWT_SKIP_AUD_CHECK")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let jwt_public_key_pem = std::env::var("ENVSYNC_CLOUD_JWT_PUBLIC_KEY").ok();

        let rate_limit_rpm = std::env::var("ENVSYNC_CLOUD_RATE_LIMIT_RPM")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(600);
        let rate_limit_burst = std::env::var("ENVSYNC_CLOUD_RATE_LIMIT_BURST")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(50);
        let max_body_bytes = std::env::var("ENVSYNC_CLOUD_MAX_BODY_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1_048_576);

        Ok(CloudConfig {
            addr,
            database_url,
            in_memory,
            pat_pepper,
            dev_token,
            jwt_issuer,
            jwt_audience,
            jwt_skip_aud_check,
            jwt_public_key_pem,
            rate_limit_rpm,
            rate_limit_burst,
            max_body_bytes,
        })
    }
}
