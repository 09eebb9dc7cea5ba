//! Domain model (C3): Teams, Projects, Environments, Secrets, Versions.
//!
//! Projects -> Environments -> SecretRecords -> SecretVersions is a strict
//! tree (spec.md 9, "Graph shapes"); nothing here needs to be reference
//! counted or shared.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A role an actor can hold on a [`Team`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Maintainer,
    Admin,
}

impl Role {
    /// Parse a role, accepting the legacy alias `writer` for `maintainer`.
    pub fn parse(s: &str) -> Option<Role> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "maintainer" => Some(Role::Maintainer),
            "writer" => Some(Role::Maintainer),
            "reader" => Some(Role::Reader),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Maintainer => "maintainer",
            Role::Reader => "reader",
        }
    }

    /// Whether this role satisfies a `required` role (role hierarchy:
    /// admin implies maintainer implies reader).
    pub fn satisfies(&self, required: Role) -> bool {
        *self >= required
    }
}

/// A team: a named set of actors with roles (spec.md 3).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    #[serde(default)]
    pub members: BTreeMap<String, Role>,
}

impl Team {
    pub fn new(name: impl Into<String>, creator: impl Into<String>) -> Self {
        let mut members = BTreeMap::new();
        members.insert(creator.into(), Role::Admin);
        Team {
            name: name.into(),
            members,
        }
    }

    pub fn role_of(&self, actor: &str) -> Option<Role> {
        self.members.get(actor).copied()
    }
}

/// One immutable encrypted snapshot of a secret's value, or a deletion
/// tombstone, identified by a per-record monotonically increasing version.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecretVersion {
    pub version: u64,
    #[serde(rename = "nonce_b64")]
    pub nonce_b64: String,
    #[serde(rename = "cipher_b64")]
    pub cipher_b64: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub rotated: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub device_id: String,
    #[serde(default)]
    pub plain_hash: Option<String>,
}

impl SecretVersion {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// `CurrentVersion`, `LastSyncedRemoteVersion`, and the append-only ordered
/// list of versions for one secret key.
///
/// Invariants (spec.md 3, enforced by every mutator in [`crate::core::vault`]):
/// - versions are sorted strictly by `version`
/// - `versions` is never mutated or truncated, only appended to
/// - `current_version == versions.last().version`
/// - `last_synced_remote_version <= current_version`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SecretRecord {
    pub current_version: u64,
    #[serde(default)]
    pub last_synced_remote_version: u64,
    #[serde(default)]
    pub versions: Vec<SecretVersion>,
}

impl SecretRecord {
    pub fn current(&self) -> Option<&SecretVersion> {
        self.versions.last()
    }

    pub fn version(&self, v: u64) -> Option<&SecretVersion> {
        self.versions.iter().find(|sv| sv.version == v)
    }

    /// Append a new version, bumping `current_version`. Callers are
    /// responsible for building a `SecretVersion` whose `version` field is
    /// `current_version + 1`.
    pub fn push(&mut self, version: SecretVersion) {
        debug_assert_eq!(version.version, self.current_version + 1);
        self.current_version = version.version;
        self.versions.push(version);
    }

    pub fn is_tombstoned(&self) -> bool {
        self.current().is_some_and(|v| v.deleted)
    }

    /// Invariant checker used by tests and `doctor`.
    pub fn check_invariants(&self) -> bool {
        if self.versions.is_empty() {
            return self.current_version == 0;
        }
        let sorted = self
            .versions
            .windows(2)
            .all(|w| w[0].version < w[1].version);
        let matches_current = self.versions.last().unwrap().version == self.current_version;
        let synced_bound = self.last_synced_remote_version <= self.current_version;
        sorted && matches_current && synced_bound
    }
}

/// A named set of secret records (spec.md default environment is `dev`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub vars: BTreeMap<String, SecretRecord>,
}

/// A project: an optional owning team, and a mapping of environment name to
/// [`Environment`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub envs: BTreeMap<String, Environment>,
}

pub const DEFAULT_ENV: &str = "dev";

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let mut envs = BTreeMap::new();
        envs.insert(DEFAULT_ENV.to_string(), Environment::default());
        Project {
            name: name.into(),
            team: None,
            envs,
        }
    }
}

/// The authoritative shared copy of Projects/Teams kept by a remote backend
/// (spec.md 3, "RemoteStore").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteStore {
    pub version: u32,
    pub revision: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt_b64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_check_b64: Option<String>,
    #[serde(default)]
    pub teams: BTreeMap<String, Team>,
    #[serde(default)]
    pub projects: BTreeMap<String, Project>,
}

impl Default for RemoteStore {
    fn default() -> Self {
        RemoteStore {
            version: 1,
            revision: 0,
            salt_b64: None,
            key_check_b64: None,
            teams: BTreeMap::new(),
            projects: BTreeMap::new(),
        }
    }
}
