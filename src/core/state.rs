//! State store (C2): the local, per-device document at
//! `~/.config/envsync/state.json`.
//!
//! Writes are atomic: serialize to a sibling temp file with mode 0600, then
//! rename. The directory is created with mode 0700 (spec.md 4.2).

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::crypto;
use crate::core::model::{Project, Team};
use crate::error::{ConfigError, Error, Result};

pub const CURRENT_SCHEMA_VERSION: u32 = 2;
const LEGACY_SCHEMA_VERSION: u32 = 1;

/// The local, per-device state document (spec.md 3, "State").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct State {
    pub schema_version: u32,
    pub device_id: String,
    #[serde(rename = "salt_b64")]
    pub salt_b64: String,
    #[serde(rename = "key_check_b64")]
    pub key_check_b64: String,
    #[serde(default)]
    pub current_team: Option<String>,
    #[serde(default)]
    pub current_project: Option<String>,
    #[serde(default = "default_env")]
    pub current_env: String,
    /// Working-directory path -> bound project name (populated by the
    /// `.envsync.json` auto-project marker and/or `project use --here`).
    #[serde(default)]
    pub project_bindings: BTreeMap<String, String>,
    #[serde(default)]
    pub teams: BTreeMap<String, Team>,
    #[serde(default)]
    pub projects: BTreeMap<String, Project>,
}

fn default_env() -> String {
    crate::core::model::DEFAULT_ENV.to_string()
}

impl State {
    /// Build a brand-new state with a fresh device id and salt.
    pub fn new() -> Self {
        State {
            schema_version: CURRENT_SCHEMA_VERSION,
            device_id: crypto::random_hex(8),
            salt_b64: base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                crypto::random_bytes(16),
            ),
            key_check_b64: String::new(),
            current_team: None,
            current_project: None,
            current_env: default_env(),
            project_bindings: BTreeMap::new(),
            teams: BTreeMap::new(),
            projects: BTreeMap::new(),
        }
    }

    pub fn salt(&self) -> Result<Vec<u8>> {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(&self.salt_b64)
            .map_err(|e| Error::Other(format!("corrupt salt in state.json: {e}")))
    }

    pub fn key_check(&self) -> Result<Vec<u8>> {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(&self.key_check_b64)
            .map_err(|e| Error::Other(format!("corrupt key-check in state.json: {e}")))
    }

    pub fn set_key_check(&mut self, tag: &[u8]) {
        use base64::Engine;
        self.key_check_b64 = base64::engine::general_purpose::STANDARD.encode(tag);
    }

    pub fn active_project(&self) -> Result<&Project> {
        let name = self
            .current_project
            .as_deref()
            .ok_or(ConfigError::NoActiveProject)?;
        self.projects
            .get(name)
            .ok_or_else(|| crate::error::SecretError::ProjectNotFound(name.to_string()).into())
    }

    pub fn active_project_mut(&mut self) -> Result<&mut Project> {
        let name = self
            .current_project
            .clone()
            .ok_or(ConfigError::NoActiveProject)?;
        self.projects
            .get_mut(&name)
            .ok_or_else(|| crate::error::SecretError::ProjectNotFound(name).into())
    }
}

impl Default for State {
    fn default() -> Self {
        State::new()
    }
}

/// Path to `~/.config/envsync/`.
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| Error::Other("could not determine config directory".into()))?;
    Ok(base.join("envsync"))
}

pub fn state_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("state.json"))
}

/// Ensure `~/.config/envsync/` exists with mode 0700.
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir()?;
    fs::create_dir_all(&dir).map_err(ConfigError::WriteFile)?;
    set_dir_mode(&dir, 0o700)?;
    Ok(dir)
}

#[cfg(unix)]
fn set_dir_mode(dir: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(mode)).map_err(ConfigError::WriteFile)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_dir_mode(_dir: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_file_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(ConfigError::WriteFile)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Load the local state, running a deterministic migration if needed.
/// Returns [`ConfigError::NotInitialized`] when the file is missing.
pub fn load_state() -> Result<State> {
    load_state_from(&state_path()?)
}

pub fn load_state_from(path: &Path) -> Result<State> {
    let raw = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigError::NotInitialized.into())
        }
        Err(e) => return Err(ConfigError::ReadFile(e).into()),
    };

    let mut value: serde_json::Value =
        serde_json::from_str(&raw).map_err(ConfigError::Parse)?;
    migrate(&mut value)?;

    serde_json::from_value(value).map_err(|e| ConfigError::Parse(e).into())
}

/// Pure migration: `(on-disk JSON, current version)` -> `(in-memory State,
/// current version)`, run on every load (spec.md 9).
fn migrate(value: &mut serde_json::Value) -> Result<()> {
    let obj = value
        .as_object_mut()
        .ok_or_else(|| Error::Other("state.json is not a JSON object".into()))?;

    let version = obj
        .get("schema_version")
        .and_then(|v| v.as_u64())
        .unwrap_or(LEGACY_SCHEMA_VERSION as u64) as u32;

    match version {
        LEGACY_SCHEMA_VERSION => {
            if obj
                .get("current_env")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .is_empty()
            {
                obj.insert(
                    "current_env".to_string(),
                    serde_json::Value::String(default_env()),
                );
            }
            for key in ["project_bindings", "teams", "projects"] {
                obj.entry(key)
                    .or_insert_with(|| serde_json::Value::Object(Default::default()));
            }
            obj.insert(
                "schema_version".to_string(),
                serde_json::Value::Number(CURRENT_SCHEMA_VERSION.into()),
            );
            Ok(())
        }
        CURRENT_SCHEMA_VERSION => Ok(()),
        other => Err(ConfigError::UnsupportedSchemaVersion(other).into()),
    }
}

/// Atomically persist state: write to a sibling temp file (mode 0600), then
/// rename into place.
pub fn save_state(state: &State) -> Result<()> {
    save_state_to(state, &state_path()?)
}

pub fn save_state_to(state: &State, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(ConfigError::WriteFile)?;
        set_dir_mode(parent, 0o700)?;
    }

    let json = serde_json::to_string_pretty(state).map_err(ConfigError::Parse)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json).map_err(ConfigError::WriteFile)?;
    set_file_mode(&tmp_path, 0o600)?;
    fs::rename(&tmp_path, path).map_err(ConfigError::WriteFile)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut state = State::new();
        state.current_project = Some("api".into());
        save_state_to(&state, &path).unwrap();

        let loaded = load_state_from(&path).unwrap();
        assert_eq!(loaded.device_id, state.device_id);
        assert_eq!(loaded.current_project.as_deref(), Some("api"));
        assert_eq!(loaded.schema_version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn missing_file_is_not_initialized() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let err = load_state_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::NotInitialized)));
    }

    #[test]
    fn legacy_v1_migrates_current_env_and_containers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let legacy = serde_json::json!({
            "schema_version": 1,
            "device_id": "abcd1234",
            "salt_b64": "AAAAAAAAAAAAAAAAAAAAAA==",
            "key_check_b64": "",
            "current_env": "",
        });
        fs::write(&path, serde_json::to_string(&legacy).unwrap()).unwrap();

        let state = load_state_from(&path).unwrap();
        assert_eq!(state.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(state.current_env, "dev");
        assert!(state.teams.is_empty());
        assert!(state.projects.is_empty());
    }

    #[test]
    fn unsupported_schema_version_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let doc = serde_json::json!({"schema_version": 99});
        fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();
        let err = load_state_from(&path).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::UnsupportedSchemaVersion(99))
        ));
    }
}
