//! HTTP remote backend (C4.2): `GET/PUT /v1/store` against a self-hosted
//! envsync server, with retry/backoff on retryable failures (spec.md 4.4.2).

use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::StatusCode;

use crate::core::model::RemoteStore;
use crate::error::{Error, Result, TransportError};

use super::retry::{with_retry, RealSleeper, RetryConfig};
use super::Remote;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpRemote {
    base_url: String,
    token: Option<String>,
    client: Client,
    retry_cfg: RetryConfig,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| Error::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(HttpRemote {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client,
            retry_cfg: RetryConfig::from_env(),
        })
    }

    fn store_url(&self) -> String {
        format!("{}/v1/store", self.base_url)
    }

    fn apply_auth(&self, builder: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(t) => builder.bearer_auth(t),
            None => builder,
        }
    }
}

/// Classify a transport-level failure per spec.md 4.4.2: retry DNS/connect/
/// timeout errors and 429/5xx; never retry other 4xx.
pub fn classify_reqwest_error(e: &reqwest::Error) -> Error {
    if e.is_timeout() || e.is_connect() {
        return TransportError::Retryable(e.to_string()).into();
    }
    TransportError::Fatal(e.to_string()).into()
}

pub fn classify_status(status: StatusCode, body: &str) -> Error {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        TransportError::Retryable(format!("HTTP {status}: {body}")).into()
    } else {
        TransportError::Fatal(format!("HTTP {status}: {body}")).into()
    }
}

impl Remote for HttpRemote {
    fn load(&self) -> Result<RemoteStore> {
        let deadline = Instant::now() + self.retry_cfg.max_delay * self.retry_cfg.max_attempts;
        with_retry(&self.retry_cfg, &RealSleeper, Some(deadline), || {
            let resp = self
                .apply_auth(self.client.get(self.store_url()))
                .send()
                .map_err(|e| classify_reqwest_error(&e))?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().unwrap_or_default();
                return Err(classify_status(status, &body));
            }
            resp.json::<RemoteStore>()
                .map_err(|e| TransportError::Fatal(format!("malformed response body: {e}")).into())
        })
    }

    fn save(&self, store: &RemoteStore, expected_revision: u64) -> Result<()> {
        let mut body = store.clone();
        body.revision = expected_revision + 1;

        let deadline = Instant::now() + self.retry_cfg.max_delay * self.retry_cfg.max_attempts;
        with_retry(&self.retry_cfg, &RealSleeper, Some(deadline), || {
            let resp = self
                .apply_auth(self.client.put(self.store_url()))
                .header("If-Match", expected_revision.to_string())
                .json(&body)
                .send()
                .map_err(|e| classify_reqwest_error(&e))?;
            let status = resp.status();
            if status == StatusCode::CONFLICT {
                let got = resp
                    .json::<RemoteStore>()
                    .map(|s| s.revision)
                    .unwrap_or(expected_revision + 1);
                return Err(TransportError::RevisionConflict {
                    expected: expected_revision,
                    got,
                }
                .into());
            }
            if !status.is_success() {
                let text = resp.text().unwrap_or_default();
                return Err(classify_status(status, &text));
            }
            Ok(())
        })
    }
}
