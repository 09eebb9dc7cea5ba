//! Cloud control-plane domain types (spec.md 4.8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::model::{RemoteStore, Role};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub organization_id: Option<Uuid>,
}

/// A principal's role on an org or team, keyed by the owner-key shape the
/// store uses (`org:<uuid>` / `team:<uuid>`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: Uuid,
    pub owner_key: String,
    pub role: Role,
}

/// One `(owner_key, project)` row: the persisted `RemoteStore` payload plus
/// its revision (spec.md 4.8, "Store writes").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultSnapshot {
    pub owner_key: String,
    pub project: String,
    pub revision: u64,
    pub store: RemoteStore,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersonalAccessToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prefix: String,
    /// HMAC-SHA256(token, pepper), hex-encoded. Never the raw token.
    pub hash_hex: String,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub actor: String,
    pub action: String,
    pub owner_key: String,
    pub project: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
