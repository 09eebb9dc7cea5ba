//! Vault model operations (C3): Set, Rotate, Get, Delete, List, Load,
//! History, Rollback.
//!
//! Every write operation re-loads State, applies the change, and re-saves
//! atomically; every operation that reveals plaintext requires successful
//! key derivation and a key-check match (spec.md 4.3).

use base64::Engine;
use chrono::Utc;

use crate::core::crypto::{self, VaultKey};
use crate::core::expiry;
use crate::core::keychain;
use crate::core::model::{Environment, Project, SecretVersion};
use crate::core::state::{self, State};
use crate::error::{CryptoError, Result, SecretError, ValidationError};

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// One entry as returned by [`Vault::list`].
pub struct ListEntry {
    pub key: String,
    pub value: Option<String>,
    pub expired: bool,
    pub deleted: bool,
}

/// One entry as returned by [`Vault::history`].
pub struct HistoryEntry {
    pub version: u64,
    pub status: &'static str,
    pub updated_at: chrono::DateTime<Utc>,
    pub device_id: String,
}

/// The primary interface for envsync vault operations. Owns the loaded
/// [`State`] and lazily derives the vault key on first use.
pub struct Vault {
    pub state: State,
    key: Option<VaultKey>,
}

impl Vault {
    /// Open the vault against the on-disk state. Does not require the
    /// recovery phrase — only operations that reveal plaintext do.
    pub fn open() -> Result<Self> {
        Ok(Vault {
            state: state::load_state()?,
            key: None,
        })
    }

    pub fn from_state(state: State) -> Self {
        Vault { state, key: None }
    }

    fn save(&self) -> Result<()> {
        state::save_state(&self.state)
    }

    /// Derive and verify the vault key, caching it for the lifetime of this
    /// `Vault`. Fails with [`CryptoError::BadPhrase`] if no phrase is
    /// available or it does not match the stored key-check tag.
    fn ensure_key(&mut self) -> Result<VaultKey> {
        if let Some(key) = &self.key {
            return Ok(key.clone());
        }

        let phrase = keychain::resolve_phrase()?.ok_or(CryptoError::BadPhrase)?;
        let salt = self.state.salt()?;
        let key = crypto::derive_key(&phrase, &salt)?;

        let stored_tag = self.state.key_check()?;
        if stored_tag.is_empty() {
            self.state.set_key_check(&crypto::key_check(&key));
            self.save()?;
        } else if !crypto::verify_key_check(&key, &stored_tag) {
            return Err(CryptoError::BadPhrase.into());
        }

        self.key = Some(key.clone());
        Ok(key)
    }

    fn project_name(&self) -> Result<String> {
        self.state
            .current_project
            .clone()
            .ok_or_else(|| crate::error::ConfigError::NoActiveProject.into())
    }

    fn project(&self) -> Result<&Project> {
        let name = self.project_name()?;
        self.state
            .projects
            .get(&name)
            .ok_or_else(|| SecretError::ProjectNotFound(name).into())
    }

    fn env(&self) -> Result<&Environment> {
        let project = self.project()?;
        let env_name = self.state.current_env.clone();
        project
            .envs
            .get(&env_name)
            .ok_or_else(|| SecretError::EnvironmentNotFound(env_name).into())
    }

    fn env_mut(&mut self) -> Result<&mut Environment> {
        let project_name = self.project_name()?;
        let env_name = self.state.current_env.clone();
        let project = self
            .state
            .projects
            .get_mut(&project_name)
            .ok_or_else(|| SecretError::ProjectNotFound(project_name))?;
        project
            .envs
            .get_mut(&env_name)
            .ok_or_else(|| SecretError::EnvironmentNotFound(env_name).into())
    }

    /// `Set(key, value, expiresAt?)`: appends a new version, `rotated=false`.
    pub fn set(&mut self, key: &str, value: &str, expires_at: Option<&str>) -> Result<u64> {
        validate_key(key)?;
        validate_value(key, value)?;
        let expires = resolve_expiry(expires_at)?;

        let vault_key = self.ensure_key()?;
        let device_id = self.state.device_id.clone();
        let enc = crypto::encrypt(&vault_key, value.as_bytes())?;

        let env = self.env_mut()?;
        let record = env.vars.entry(key.to_string()).or_default();
        let version = record.current_version + 1;
        record.push(SecretVersion {
            version,
            nonce_b64: B64.encode(enc.nonce),
            cipher_b64: B64.encode(enc.ciphertext),
            deleted: false,
            rotated: false,
            expires_at: expires,
            updated_at: Utc::now(),
            device_id,
            plain_hash: Some(enc.plain_hash),
        });
        self.save()?;
        Ok(version)
    }

    /// `Rotate(key, value)`: like `Set`, but the key must already exist and
    /// the new version is tagged `rotated=true`.
    pub fn rotate(&mut self, key: &str, value: &str) -> Result<u64> {
        validate_value(key, value)?;
        {
            let env = self.env()?;
            if !env.vars.contains_key(key) {
                return Err(SecretError::NotFound(key.to_string()).into());
            }
        }

        let vault_key = self.ensure_key()?;
        let device_id = self.state.device_id.clone();
        let enc = crypto::encrypt(&vault_key, value.as_bytes())?;

        let env = self.env_mut()?;
        let record = env
            .vars
            .get_mut(key)
            .ok_or_else(|| SecretError::NotFound(key.to_string()))?;
        let version = record.current_version + 1;
        record.push(SecretVersion {
            version,
            nonce_b64: B64.encode(enc.nonce),
            cipher_b64: B64.encode(enc.ciphertext),
            deleted: false,
            rotated: true,
            expires_at: None,
            updated_at: Utc::now(),
            device_id,
            plain_hash: Some(enc.plain_hash),
        });
        self.save()?;
        Ok(version)
    }

    /// `Get(key)`: decrypts the current version; rejects deleted/expired.
    pub fn get(&mut self, key: &str) -> Result<String> {
        let vault_key = self.ensure_key()?;
        let now = Utc::now();

        let (cipher_b64, nonce_b64) = {
            let env = self.env()?;
            let record = env
                .vars
                .get(key)
                .ok_or_else(|| SecretError::NotFound(key.to_string()))?;
            let current = record
                .current()
                .ok_or_else(|| SecretError::NotFound(key.to_string()))?;
            if current.deleted {
                return Err(SecretError::Deleted(key.to_string()).into());
            }
            if current.is_expired(now) {
                return Err(SecretError::Expired(key.to_string()).into());
            }
            (current.cipher_b64.clone(), current.nonce_b64.clone())
        };

        let ciphertext = decode_b64(&cipher_b64)?;
        let nonce = decode_b64(&nonce_b64)?;
        let plain = crypto::decrypt(&vault_key, &ciphertext, &nonce)?;
        Ok(String::from_utf8_lossy(&plain).into_owned())
    }

    /// `Delete(key)`: appends a tombstone version with empty ciphertext.
    pub fn delete(&mut self, key: &str) -> Result<u64> {
        let device_id = self.state.device_id.clone();
        let env = self.env_mut()?;
        let record = env
            .vars
            .get_mut(key)
            .ok_or_else(|| SecretError::NotFound(key.to_string()))?;
        let version = record.current_version + 1;
        record.push(SecretVersion {
            version,
            nonce_b64: String::new(),
            cipher_b64: String::new(),
            deleted: true,
            rotated: false,
            expires_at: None,
            updated_at: Utc::now(),
            device_id,
            plain_hash: None,
        });
        self.save()?;
        Ok(version)
    }

    /// `List(show?)`: enumerate keys sorted ascending. Values are masked
    /// unless `show`, in which case the phrase is required.
    pub fn list(&mut self, show: bool) -> Result<Vec<ListEntry>> {
        if show {
            self.ensure_key()?;
        }
        let now = Utc::now();
        let mut entries: Vec<ListEntry> = {
            let env = self.env()?;
            env.vars
                .iter()
                .map(|(key, record)| {
                    let current = record.current();
                    ListEntry {
                        key: key.clone(),
                        value: None,
                        expired: current.is_some_and(|v| v.is_expired(now)),
                        deleted: current.is_some_and(|v| v.deleted),
                    }
                })
                .collect()
        };

        if show {
            for entry in &mut entries {
                if !entry.deleted {
                    entry.value = self.get(&entry.key).ok();
                }
            }
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    /// `Load`: shell-export lines, skipping deleted and expired secrets.
    pub fn load_exports(&mut self) -> Result<Vec<String>> {
        self.ensure_key()?;
        let now = Utc::now();
        let keys: Vec<String> = {
            let env = self.env()?;
            env.vars
                .iter()
                .filter(|(_, rec)| {
                    rec.current()
                        .is_some_and(|v| !v.deleted && !v.is_expired(now))
                })
                .map(|(k, _)| k.clone())
                .collect()
        };

        let mut lines = Vec::with_capacity(keys.len());
        for key in keys {
            let value = self.get(&key)?;
            lines.push(format!("export {}=\"{}\"", key, shell_escape(&value)));
        }
        lines.sort();
        Ok(lines)
    }

    /// `History(key)`: every version with a status and provenance.
    pub fn history(&self, key: &str) -> Result<Vec<HistoryEntry>> {
        let env = self.env()?;
        let record = env
            .vars
            .get(key)
            .ok_or_else(|| SecretError::NotFound(key.to_string()))?;

        Ok(record
            .versions
            .iter()
            .map(|v| HistoryEntry {
                version: v.version,
                status: if v.deleted {
                    "deleted"
                } else if v.version == record.current_version {
                    "active"
                } else {
                    "rotated"
                },
                updated_at: v.updated_at,
                device_id: v.device_id.clone(),
            })
            .collect())
    }

    /// `Rollback(key, n)`: appends a new version byte-identical to version
    /// `n`'s ciphertext, preserving plaintext equality without revealing it.
    pub fn rollback(&mut self, key: &str, n: u64) -> Result<u64> {
        let device_id = self.state.device_id.clone();
        let env = self.env_mut()?;
        let record = env
            .vars
            .get_mut(key)
            .ok_or_else(|| SecretError::NotFound(key.to_string()))?;
        let target = record
            .version(n)
            .cloned()
            .ok_or(SecretError::VersionNotFound {
                key: key.to_string(),
                version: n,
            })?;

        let version = record.current_version + 1;
        record.push(SecretVersion {
            version,
            nonce_b64: target.nonce_b64,
            cipher_b64: target.cipher_b64,
            deleted: target.deleted,
            rotated: false,
            expires_at: target.expires_at,
            updated_at: Utc::now(),
            device_id,
            plain_hash: target.plain_hash,
        });
        self.save()?;
        Ok(version)
    }
}

fn resolve_expiry(input: Option<&str>) -> Result<Option<chrono::DateTime<Utc>>> {
    match input {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => Ok(Some(expiry::parse_expiry(s, Utc::now())?)),
    }
}

fn decode_b64(s: &str) -> Result<Vec<u8>> {
    B64.decode(s)
        .map_err(|_| crate::error::CryptoError::InvalidCiphertext.into())
}

/// Secret keys must be valid environment variable names.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(ValidationError::EmptyKey.into());
    }
    if key.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidKey {
            key: key.to_string(),
            reason: "cannot start with a digit".to_string(),
        }
        .into());
    }
    for (i, ch) in key.chars().enumerate() {
        if !ch.is_ascii_alphanumeric() && ch != '_' {
            return Err(ValidationError::InvalidKey {
                key: key.to_string(),
                reason: format!(
                    "invalid character '{ch}' at position {}; only A-Z, 0-9, and underscore are allowed",
                    i + 1
                ),
            }
            .into());
        }
    }
    Ok(())
}

fn validate_value(key: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ValidationError::EmptyValue(key.to_string()).into());
    }
    Ok(())
}

/// Escape a value for use inside a double-quoted shell string.
fn shell_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Project;

    fn fresh_vault(phrase: &str) -> Vault {
        std::env::set_var("ENVSYNC_RECOVERY_PHRASE", phrase);
        let mut state = State::new();
        let salt = state.salt().unwrap();
        let key = crypto::derive_key(phrase, &salt).unwrap();
        state.set_key_check(&crypto::key_check(&key));
        state.projects.insert("api".into(), Project::new("api"));
        state.current_project = Some("api".into());
        Vault::from_state(state)
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut vault = fresh_vault("test phrase one");
        vault.state_will_not_persist();
        let v = vault.set("TOKEN", "abc", None).unwrap();
        assert_eq!(v, 1);
        assert_eq!(vault.get("TOKEN").unwrap(), "abc");
    }

    #[test]
    fn rotate_requires_existing_key() {
        let mut vault = fresh_vault("test phrase two");
        vault.state_will_not_persist();
        assert!(vault.rotate("TOKEN", "abc").is_err());
        vault.set("TOKEN", "abc", None).unwrap();
        assert!(vault.rotate("TOKEN", "def").is_ok());
        assert_eq!(vault.get("TOKEN").unwrap(), "def");
    }

    #[test]
    fn rollback_restores_old_ciphertext() {
        let mut vault = fresh_vault("test phrase three");
        vault.state_will_not_persist();
        vault.set("TOKEN", "abc", None).unwrap();
        vault.set("TOKEN", "def", None).unwrap();
        vault.rollback("TOKEN", 1).unwrap();
        assert_eq!(vault.get("TOKEN").unwrap(), "abc");
    }

    #[test]
    fn delete_then_get_is_deleted_error() {
        let mut vault = fresh_vault("test phrase four");
        vault.state_will_not_persist();
        vault.set("TOKEN", "abc", None).unwrap();
        vault.delete("TOKEN").unwrap();
        let err = vault.get("TOKEN").unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Secret(SecretError::Deleted(_))
        ));
    }

    #[test]
    fn invalid_key_rejected() {
        let mut vault = fresh_vault("test phrase five");
        vault.state_will_not_persist();
        assert!(vault.set("1BAD", "x", None).is_err());
        assert!(vault.set("", "x", None).is_err());
        assert!(vault.set("GOOD_KEY", "", None).is_err());
    }

    impl Vault {
        /// Test helper: point the state file at a throwaway temp dir so
        /// `save()` calls in these unit tests don't touch the real
        /// `~/.config/envsync`.
        fn state_will_not_persist(&self) {
            let dir = tempfile::tempdir().unwrap();
            std::env::set_var("XDG_CONFIG_HOME", dir.path());
            std::env::set_var("HOME", dir.path());
            std::mem::forget(dir);
        }
    }
}
