//! Cloud remote backend (C4.3): the same wire contract as the HTTP backend,
//! scoped to an owner (user/org/team) and project, authenticated with an
//! access token from the session store (spec.md 4.4.3).

use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::core::model::RemoteStore;
use crate::error::{Error, Result, TransportError};

use super::http::{classify_reqwest_error, classify_status};
use super::retry::{with_retry, RealSleeper, RetryConfig};
use super::session;
use super::Remote;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Which owner scope a cloud request targets (spec.md 4.8, owner
/// resolution): personal (the authenticated user), an organization, or a
/// team. Organization and team are mutually exclusive.
#[derive(Clone, Debug, Default)]
pub enum Owner {
    #[default]
    Personal,
    Organization(String),
    Team(String),
}

pub struct CloudRemote {
    base_url: String,
    project: String,
    owner: Owner,
    token: String,
    client: Client,
    retry_cfg: RetryConfig,
}

impl CloudRemote {
    pub fn new(base_url: impl Into<String>, project: impl Into<String>, owner: Owner) -> Result<Self> {
        let session = session::load_valid()?;
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| Error::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(CloudRemote {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project: project.into(),
            owner,
            token: session.access_token,
            client,
            retry_cfg: RetryConfig::from_env(),
        })
    }

    fn store_url(&self) -> String {
        let mut url = format!("{}/v1/store?project={}", self.base_url, self.project);
        match &self.owner {
            Owner::Personal => {}
            Owner::Organization(id) => url.push_str(&format!("&organization_id={id}")),
            Owner::Team(id) => url.push_str(&format!("&team_id={id}")),
        }
        url
    }

    /// Validate the current session against `GET /v1/me`, returning the
    /// identity payload on success.
    pub fn whoami(&self) -> Result<serde_json::Value> {
        let resp = self
            .client
            .get(self.me_url())
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| classify_reqwest_error(&e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(classify_status(status, &body));
        }
        resp.json::<serde_json::Value>()
            .map_err(|e| TransportError::Fatal(format!("malformed /v1/me response: {e}")).into())
    }

    fn me_url(&self) -> String {
        format!("{}/v1/me", self.base_url)
    }
}

/// `login`: validate a raw access token by calling `GET /v1/me`, returning
/// the identity payload on success (spec.md 4.4.3).
pub fn validate_and_fetch_identity(base_url: &str, access_token: &str) -> Result<serde_json::Value> {
    let url = format!("{}/v1/me", base_url.trim_end_matches('/'));
    let client = Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .map_err(|e| Error::Other(format!("failed to build HTTP client: {e}")))?;
    let resp = client
        .get(&url)
        .bearer_auth(access_token)
        .send()
        .map_err(|e| classify_reqwest_error(&e))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().unwrap_or_default();
        return Err(classify_status(status, &body));
    }
    resp.json::<serde_json::Value>()
        .map_err(|e| TransportError::Fatal(format!("malformed /v1/me response: {e}")).into())
}

#[derive(Serialize)]
struct IssueTokenRequest<'a> {
    scopes: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Deserialize, Debug)]
pub struct IssuedToken {
    pub id: String,
    pub token: String,
    pub token_prefix: String,
    pub scopes: Vec<String>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// `POST /v1/tokens`: issue a new personal access token (spec.md 4.8).
pub fn issue_token(
    base_url: &str,
    access_token: &str,
    scopes: &[&str],
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<IssuedToken> {
    let url = format!("{}/v1/tokens", base_url.trim_end_matches('/'));
    let client = Client::builder().timeout(DEFAULT_TIMEOUT).build().unwrap();
    let resp = client
        .post(&url)
        .bearer_auth(access_token)
        .json(&IssueTokenRequest { scopes, expires_at })
        .send()
        .map_err(|e| classify_reqwest_error(&e))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().unwrap_or_default();
        return Err(classify_status(status, &body));
    }
    resp.json::<IssuedToken>()
        .map_err(|e| TransportError::Fatal(format!("malformed token response: {e}")).into())
}

/// `DELETE /v1/tokens/:id`: revoke a personal access token.
pub fn revoke_token(base_url: &str, access_token: &str, token_id: &str) -> Result<()> {
    let url = format!("{}/v1/tokens/{}", base_url.trim_end_matches('/'), token_id);
    let client = Client::builder().timeout(DEFAULT_TIMEOUT).build().unwrap();
    let resp = client
        .delete(&url)
        .bearer_auth(access_token)
        .send()
        .map_err(|e| classify_reqwest_error(&e))?;
    let status = resp.status();
    if status == StatusCode::NO_CONTENT || status.is_success() {
        return Ok(());
    }
    let body = resp.text().unwrap_or_default();
    Err(classify_status(status, &body))
}

impl Remote for CloudRemote {
    fn load(&self) -> Result<RemoteStore> {
        session::load_valid()?;
        let deadline = Instant::now() + self.retry_cfg.max_delay * self.retry_cfg.max_attempts;
        with_retry(&self.retry_cfg, &RealSleeper, Some(deadline), || {
            let resp = self
                .client
                .get(self.store_url())
                .bearer_auth(&self.token)
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
                .client
                .put(self.store_url())
                .bearer_auth(&self.token)
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
