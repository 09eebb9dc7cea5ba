//! Remote transport (C4): one `Remote` interface, three implementations,
//! selected by precedence at runtime (spec.md 4.4).

pub mod cloud;
pub mod file;
pub mod http;
pub mod retry;
pub mod session;

use crate::core::model::RemoteStore;
use crate::core::state::State;
use crate::error::{Result, TransportError};

/// Uniform interface over the file, HTTP, and cloud backends (spec.md 4.4).
pub trait Remote {
    fn load(&self) -> Result<RemoteStore>;
    fn save(&self, store: &RemoteStore, expected_revision: u64) -> Result<()>;
}

/// Open the remote backend selected by env configuration (spec.md 4.4,
/// "Backend selection precedence"): an explicit `ENVSYNC_REMOTE_MODE` wins;
/// else HTTP if a remote URL is configured; else cloud if a cloud URL plus a
/// session exists; else file.
pub fn open() -> Result<Box<dyn Remote>> {
    if let Ok(mode) = std::env::var("ENVSYNC_REMOTE_MODE") {
        return open_mode(&mode);
    }
    if let Ok(url) = std::env::var("ENVSYNC_REMOTE_URL") {
        let token = std::env::var("ENVSYNC_REMOTE_TOKEN").ok();
        return Ok(Box::new(http::HttpRemote::new(url, token)?));
    }
    if let Ok(url) = std::env::var("ENVSYNC_CLOUD_URL") {
        if session::load().ok().flatten().is_some() {
            let project = current_project_name()?;
            return Ok(Box::new(cloud::CloudRemote::new(
                url,
                project,
                cloud_owner_from_env(),
            )?));
        }
    }
    Ok(Box::new(file::FileRemote::new(file::FileRemote::default_path()?)))
}

fn open_mode(mode: &str) -> Result<Box<dyn Remote>> {
    match mode {
        "file" => Ok(Box::new(file::FileRemote::new(file::FileRemote::default_path()?))),
        "http" => {
            let url = std::env::var("ENVSYNC_REMOTE_URL")
                .map_err(|_| crate::error::Error::Other("ENVSYNC_REMOTE_URL is required for mode=http".into()))?;
            let token = std::env::var("ENVSYNC_REMOTE_TOKEN").ok();
            Ok(Box::new(http::HttpRemote::new(url, token)?))
        }
        "cloud" => {
            let url = std::env::var("ENVSYNC_CLOUD_URL")
                .map_err(|_| crate::error::Error::Other("ENVSYNC_CLOUD_URL is required for mode=cloud".into()))?;
            let project = current_project_name()?;
            Ok(Box::new(cloud::CloudRemote::new(url, project, cloud_owner_from_env())?))
        }
        other => Err(crate::error::Error::Other(format!(
            "unknown ENVSYNC_REMOTE_MODE '{other}': expected file, http, or cloud"
        ))),
    }
}

fn current_project_name() -> Result<String> {
    let state = crate::core::state::load_state()?;
    state
        .current_project
        .clone()
        .ok_or_else(|| crate::error::ConfigError::NoActiveProject.into())
}

fn cloud_owner_from_env() -> cloud::Owner {
    if let Ok(team) = std::env::var("ENVSYNC_CLOUD_TEAM_ID") {
        return cloud::Owner::Team(team);
    }
    if let Ok(org) = std::env::var("ENVSYNC_CLOUD_ORGANIZATION_ID") {
        return cloud::Owner::Organization(org);
    }
    cloud::Owner::Personal
}

/// C4.4.4: every successful Pull/Push validates the remote's crypto
/// metadata against local state before the merge is trusted. An empty
/// remote (no salt/key-check yet) is accepted unconditionally — the first
/// pusher "claims" the remote (spec.md 9, preserved intentionally).
pub fn validate_remote_crypto(state: &State, remote: &RemoteStore) -> Result<()> {
    let remote_has_crypto = remote
        .salt_b64
        .as_ref()
        .is_some_and(|s| !s.is_empty())
        || remote
            .key_check_b64
            .as_ref()
            .is_some_and(|s| !s.is_empty());
    if !remote_has_crypto {
        return Ok(());
    }
    let salt_matches = remote.salt_b64.as_deref() == Some(state.salt_b64.as_str());
    let key_check_matches = remote.key_check_b64.as_deref() == Some(state.key_check_b64.as_str());
    if salt_matches && key_check_matches {
        Ok(())
    } else {
        Err(TransportError::PhraseMismatch.into())
    }
}

/// Attach the local salt/key-check to a store before it is pushed, so the
/// remote carries enough crypto metadata for the next puller's guard.
pub fn attach_local_crypto(state: &State, store: &mut RemoteStore) {
    store.salt_b64 = Some(state.salt_b64.clone());
    store.key_check_b64 = Some(state.key_check_b64.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::State;

    #[test]
    fn empty_remote_crypto_is_claimed_unconditionally() {
        let state = State::new();
        let remote = RemoteStore::default();
        assert!(validate_remote_crypto(&state, &remote).is_ok());
    }

    #[test]
    fn matching_remote_crypto_passes() {
        let mut state = State::new();
        state.set_key_check(b"tag");
        let mut remote = RemoteStore::default();
        attach_local_crypto(&state, &mut remote);
        assert!(validate_remote_crypto(&state, &remote).is_ok());
    }

    #[test]
    fn mismatched_remote_crypto_fails() {
        let mut state = State::new();
        state.set_key_check(b"tag");
        let mut other = State::new();
        other.set_key_check(b"other-tag");
        let mut remote = RemoteStore::default();
        attach_local_crypto(&other, &mut remote);

        let err = validate_remote_crypto(&state, &remote).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Transport(TransportError::PhraseMismatch)
        ));
    }
}
