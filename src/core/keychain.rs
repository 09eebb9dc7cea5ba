//! Keychain abstraction: two named secret sinks, `phrase` and `session`,
//! each with `get`/`put`/`clear` (spec.md 9).
//!
//! Backed by the OS keychain (macOS Keychain, Secret Service on Linux, the
//! Windows Credential Manager) via the `keyring` crate, falling back to a
//! file under `~/.config/envsync/` when the platform backend is unavailable.
//! Keychain absence or failure is never fatal — callers fall back to
//! env/file/prompt (spec.md 9).

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::state::config_dir;
use crate::error::Result;

fn service_name() -> String {
    std::env::var("ENVSYNC_KEYCHAIN_SERVICE").unwrap_or_else(|_| "envsync".to_string())
}

fn keyring_entry(sink: &str) -> Option<keyring::Entry> {
    keyring::Entry::new(&service_name(), sink).ok()
}

/// Get a secret from the named sink: keychain first, then its file
/// fallback. Returns `Ok(None)` if absent anywhere (not an error).
pub fn get(sink: &str) -> Result<Option<String>> {
    if let Some(entry) = keyring_entry(sink) {
        match entry.get_password() {
            Ok(v) => return Ok(Some(v)),
            Err(keyring::Error::NoEntry) => {}
            Err(_) => { /* keychain unavailable; fall through to file */ }
        }
    }
    file_get(sink)
}

/// Store a secret in the named sink, preferring the OS keychain.
pub fn put(sink: &str, value: &str) -> Result<()> {
    if let Some(entry) = keyring_entry(sink) {
        if entry.set_password(value).is_ok() {
            return Ok(());
        }
    }
    file_put(sink, value)
}

/// Remove a secret from both the keychain and its file fallback.
pub fn clear(sink: &str) -> Result<()> {
    if let Some(entry) = keyring_entry(sink) {
        let _ = entry.delete_credential();
    }
    file_clear(sink)
}

fn sink_path(sink: &str) -> Result<PathBuf> {
    Ok(config_dir()?.join(format!("{sink}.json")))
}

#[derive(Serialize, Deserialize)]
struct FileSecret {
    value: String,
}

fn file_get(sink: &str) -> Result<Option<String>> {
    let path = sink_path(sink)?;
    match fs::read_to_string(&path) {
        Ok(raw) => {
            let parsed: FileSecret = serde_json::from_str(&raw)?;
            Ok(Some(parsed.value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn file_put(sink: &str, value: &str) -> Result<()> {
    let path = sink_path(sink)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string(&FileSecret {
        value: value.to_string(),
    })?;
    fs::write(&path, json)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

fn file_clear(sink: &str) -> Result<()> {
    let path = sink_path(sink)?;
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Resolve the recovery phrase: `ENVSYNC_RECOVERY_PHRASE` env var first,
/// then the `phrase` keychain sink.
pub fn resolve_phrase() -> Result<Option<String>> {
    if let Ok(v) = std::env::var("ENVSYNC_RECOVERY_PHRASE") {
        if !v.is_empty() {
            return Ok(Some(v));
        }
    }
    get("phrase")
}
