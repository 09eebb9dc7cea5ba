//! Storage for the cloud control plane: one `CloudDb` trait, an in-memory
//! implementation (`ENVSYNC_CLOUD_INMEMORY=true`, and the default test
//! backend), and a Postgres implementation behind the `postgres` feature
//! (spec.md 4.8, "Store writes").

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::core::model::{RemoteStore, Role};
use crate::error::{CloudError, Error, Result};

use super::models::{AuditEvent, Membership, PersonalAccessToken, User, VaultSnapshot};

#[async_trait]
pub trait CloudDb: Send + Sync {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// The principal's role on `owner_key` (`org:<uuid>` / `team:<uuid>`),
    /// or `None` if they aren't a member.
    async fn membership_role(&self, user_id: Uuid, owner_key: &str) -> Result<Option<Role>>;

    async fn load_snapshot(&self, owner_key: &str, project: &str) -> Result<Option<VaultSnapshot>>;

    /// Transactional read-modify-write keyed by `(owner_key, project)`
    /// (spec.md 4.8, "Store writes"): rejects unless
    /// `current_revision == expected_revision`.
    async fn save_snapshot(
        &self,
        owner_key: &str,
        project: &str,
        expected_revision: u64,
        store: RemoteStore,
    ) -> Result<VaultSnapshot>;

    async fn find_pat_by_prefix(&self, prefix: &str) -> Result<Option<PersonalAccessToken>>;
    async fn insert_pat(&self, pat: PersonalAccessToken) -> Result<()>;
    async fn touch_pat(&self, id: Uuid) -> Result<()>;
    async fn revoke_pat(&self, id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn append_audit_event(&self, event: AuditEvent) -> Result<()>;
}

pub fn conflict(expected: u64, got: u64) -> Error {
    crate::error::TransportError::RevisionConflict { expected, got }.into()
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

pub mod memory {
    use std::collections::HashMap;

    use tokio::sync::RwLock;

    use super::*;

    #[derive(Default)]
    pub struct InMemoryDb {
        users: RwLock<HashMap<Uuid, User>>,
        memberships: RwLock<Vec<Membership>>,
        snapshots: RwLock<HashMap<(String, String), VaultSnapshot>>,
        tokens: RwLock<HashMap<Uuid, PersonalAccessToken>>,
        token_by_prefix: RwLock<HashMap<String, Uuid>>,
        audit: RwLock<Vec<AuditEvent>>,
    }

    impl InMemoryDb {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed a user and zero or more memberships, used by tests and by a
        /// dev deployment's bootstrap.
        pub async fn seed_user(&self, user: User, memberships: Vec<Membership>) {
            self.users.write().await.insert(user.id, user);
            self.memberships.write().await.extend(memberships);
        }
    }

    #[async_trait]
    impl CloudDb for InMemoryDb {
        async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
            Ok(self.users.read().await.get(&id).cloned())
        }

        async fn membership_role(&self, user_id: Uuid, owner_key: &str) -> Result<Option<Role>> {
            Ok(self
                .memberships
                .read()
                .await
                .iter()
                .find(|m| m.user_id == user_id && m.owner_key == owner_key)
                .map(|m| m.role))
        }

        async fn load_snapshot(&self, owner_key: &str, project: &str) -> Result<Option<VaultSnapshot>> {
            Ok(self
                .snapshots
                .read()
                .await
                .get(&(owner_key.to_string(), project.to_string()))
                .cloned())
        }

        async fn save_snapshot(
            &self,
            owner_key: &str,
            project: &str,
            expected_revision: u64,
            store: RemoteStore,
        ) -> Result<VaultSnapshot> {
            let mut snapshots = self.snapshots.write().await;
            let key = (owner_key.to_string(), project.to_string());
            let current_revision = snapshots.get(&key).map(|s| s.revision).unwrap_or(0);
            if current_revision != expected_revision {
                return Err(conflict(expected_revision, current_revision));
            }
            let mut next_store = store;
            next_store.revision = expected_revision + 1;
            let snapshot = VaultSnapshot {
                owner_key: owner_key.to_string(),
                project: project.to_string(),
                revision: expected_revision + 1,
                store: next_store,
            };
            snapshots.insert(key, snapshot.clone());
            Ok(snapshot)
        }

        async fn find_pat_by_prefix(&self, prefix: &str) -> Result<Option<PersonalAccessToken>> {
            let by_prefix = self.token_by_prefix.read().await;
            let Some(id) = by_prefix.get(prefix).copied() else {
                return Ok(None);
            };
            Ok(self.tokens.read().await.get(&id).cloned())
        }

        async fn insert_pat(&self, pat: PersonalAccessToken) -> Result<()> {
            self.token_by_prefix.write().await.insert(pat.prefix.clone(), pat.id);
            self.tokens.write().await.insert(pat.id, pat);
            Ok(())
        }

        async fn touch_pat(&self, id: Uuid) -> Result<()> {
            if let Some(pat) = self.tokens.write().await.get_mut(&id) {
                pat.last_used_at = Some(Utc::now());
            }
            Ok(())
        }

        async fn revoke_pat(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
            let mut tokens = self.tokens.write().await;
            match tokens.get_mut(&id) {
                Some(pat) if pat.user_id == user_id => {
                    pat.revoked_at = Some(Utc::now());
                    Ok(true)
                }
                _ => Err(CloudError::TokenNotFound(id.to_string()).into()),
            }
        }

        async fn append_audit_event(&self, event: AuditEvent) -> Result<()> {
            self.audit.write().await.push(event);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Postgres backend
// ---------------------------------------------------------------------------

#[cfg(feature = "postgres")]
pub mod postgres {
    use sqlx::PgPool;
    use sqlx::Row;

    use super::*;

    pub struct PostgresDb {
        pool: PgPool,
    }

    impl PostgresDb {
        pub async fn connect(database_url: &str) -> Result<Self> {
            let pool = PgPool::connect(database_url)
                .await
                .map_err(|e| Error::Other(format!("failed to connect to Postgres: {e}")))?;
            Ok(PostgresDb { pool })
        }

        /// Creates the control-plane tables if they don't already exist.
        /// Idempotent, safe to call on every startup.
        pub async fn migrate(&self) -> Result<()> {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id UUID PRIMARY KEY,
                    email TEXT NOT NULL UNIQUE
                );
                CREATE TABLE IF NOT EXISTS memberships (
                    user_id UUID NOT NULL,
                    owner_key TEXT NOT NULL,
                    role TEXT NOT NULL,
                    PRIMARY KEY (user_id, owner_key)
                );
                CREATE TABLE IF NOT EXISTS vault_snapshots (
                    owner_key TEXT NOT NULL,
                    project TEXT NOT NULL,
                    revision BIGINT NOT NULL,
                    payload JSONB NOT NULL,
                    PRIMARY KEY (owner_key, project)
                );
                CREATE TABLE IF NOT EXISTS personal_access_tokens (
                    id UUID PRIMARY KEY,
                    user_id UUID NOT NULL,
                    prefix TEXT NOT NULL UNIQUE,
                    hash_hex TEXT NOT NULL,
                    scopes TEXT[] NOT NULL,
                    expires_at TIMESTAMPTZ,
                    revoked_at TIMESTAMPTZ,
                    last_used_at TIMESTAMPTZ,
                    created_at TIMESTAMPTZ NOT NULL
                );
                CREATE TABLE IF NOT EXISTS audit_events (
                    id UUID PRIMARY KEY,
                    actor TEXT NOT NULL,
                    action TEXT NOT NULL,
                    owner_key TEXT NOT NULL,
                    project TEXT NOT NULL,
                    metadata JSONB NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL
                );
                "#,
            )
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Other(format!("failed to migrate schema: {e}")))?;
            Ok(())
        }
    }

    #[async_trait]
    impl CloudDb for PostgresDb {
        async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
            let row = sqlx::query("SELECT id, email FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| Error::Other(e.to_string()))?;
            Ok(row.map(|r| User {
                id: r.get("id"),
                email: r.get("email"),
            }))
        }

        async fn membership_role(&self, user_id: Uuid, owner_key: &str) -> Result<Option<Role>> {
            let row = sqlx::query("SELECT role FROM memberships WHERE user_id = $1 AND owner_key = $2")
                .bind(user_id)
                .bind(owner_key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| Error::Other(e.to_string()))?;
            Ok(row.and_then(|r| Role::parse(r.get::<String, _>("role").as_str())))
        }

        async fn load_snapshot(&self, owner_key: &str, project: &str) -> Result<Option<VaultSnapshot>> {
            let row = sqlx::query(
                "SELECT owner_key, project, revision, payload FROM vault_snapshots WHERE owner_key = $1 AND project = $2",
            )
            .bind(owner_key)
            .bind(project)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Other(e.to_string()))?;

            row.map(|r| -> Result<VaultSnapshot> {
                let payload: serde_json::Value = r.get("payload");
                let revision: i64 = r.get("revision");
                let mut store: RemoteStore = serde_json::from_value(payload).map_err(Error::Json)?;
                store.revision = revision as u64;
                Ok(VaultSnapshot {
                    owner_key: r.get("owner_key"),
                    project: r.get("project"),
                    revision: revision as u64,
                    store,
                })
            })
            .transpose()
        }

        async fn save_snapshot(
            &self,
            owner_key: &str,
            project: &str,
            expected_revision: u64,
            store: RemoteStore,
        ) -> Result<VaultSnapshot> {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| Error::Other(e.to_string()))?;

            let current_row = sqlx::query(
                "SELECT revision FROM vault_snapshots WHERE owner_key = $1 AND project = $2 FOR UPDATE",
            )
            .bind(owner_key)
            .bind(project)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| Error::Other(e.to_string()))?;

            let current_revision = current_row.map(|r| r.get::<i64, _>("revision") as u64).unwrap_or(0);
            if current_revision != expected_revision {
                return Err(conflict(expected_revision, current_revision));
            }

            let next_revision = expected_revision + 1;
            let mut next_store = store;
            next_store.revision = next_revision;
            let payload = serde_json::to_value(&next_store).map_err(Error::Json)?;

            sqlx::query(
                r#"INSERT INTO vault_snapshots (owner_key, project, revision, payload)
                   VALUES ($1, $2, $3, $4)
                   ON CONFLICT (owner_key, project)
                   DO UPDATE SET revision = EXCLUDED.revision, payload = EXCLUDED.payload"#,
            )
            .bind(owner_key)
            .bind(project)
            .bind(next_revision as i64)
            .bind(&payload)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Other(e.to_string()))?;

            tx.commit().await.map_err(|e| Error::Other(e.to_string()))?;

            Ok(VaultSnapshot {
                owner_key: owner_key.to_string(),
                project: project.to_string(),
                revision: next_revision,
                store: next_store,
            })
        }

        async fn find_pat_by_prefix(&self, prefix: &str) -> Result<Option<PersonalAccessToken>> {
            let row = sqlx::query(
                "SELECT id, user_id, prefix, hash_hex, scopes, expires_at, revoked_at, last_used_at, created_at
                 FROM personal_access_tokens WHERE prefix = $1",
            )
            .bind(prefix)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Other(e.to_string()))?;
            Ok(row.map(|r| PersonalAccessToken {
                id: r.get("id"),
                user_id: r.get("user_id"),
                prefix: r.get("prefix"),
                hash_hex: r.get("hash_hex"),
                scopes: r.get("scopes"),
                expires_at: r.get("expires_at"),
                revoked_at: r.get("revoked_at"),
                last_used_at: r.get("last_used_at"),
                created_at: r.get("created_at"),
            }))
        }

        async fn insert_pat(&self, pat: PersonalAccessToken) -> Result<()> {
            sqlx::query(
                r#"INSERT INTO personal_access_tokens
                   (id, user_id, prefix, hash_hex, scopes, expires_at, revoked_at, last_used_at, created_at)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
            )
            .bind(pat.id)
            .bind(pat.user_id)
            .bind(pat.prefix)
            .bind(pat.hash_hex)
            .bind(pat.scopes)
            .bind(pat.expires_at)
            .bind(pat.revoked_at)
            .bind(pat.last_used_at)
            .bind(pat.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Other(e.to_string()))?;
            Ok(())
        }

        async fn touch_pat(&self, id: Uuid) -> Result<()> {
            sqlx::query("UPDATE personal_access_tokens SET last_used_at = now() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| Error::Other(e.to_string()))?;
            Ok(())
        }

        async fn revoke_pat(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
            let result = sqlx::query(
                "UPDATE personal_access_tokens SET revoked_at = now() WHERE id = $1 AND user_id = $2",
            )
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Other(e.to_string()))?;
            if result.rows_affected() == 0 {
                return Err(CloudError::TokenNotFound(id.to_string()).into());
            }
            Ok(true)
        }

        async fn append_audit_event(&self, event: AuditEvent) -> Result<()> {
            sqlx::query(
                r#"INSERT INTO audit_events (id, actor, action, owner_key, project, metadata, created_at)
                   VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
            )
            .bind(event.id)
            .bind(event.actor)
            .bind(event.action)
            .bind(event.owner_key)
            .bind(event.project)
            .bind(event.metadata)
            .bind(event.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Other(e.to_string()))?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::InMemoryDb;
    use super::*;
    use crate::core::model::Project;

    #[tokio::test]
    async fn save_snapshot_rejects_stale_revision() {
        let db = InMemoryDb::new();
        db.save_snapshot("user:u1", "default", 0, RemoteStore::default())
            .await
            .unwrap();
        let err = db
            .save_snapshot("user:u1", "default", 0, RemoteStore::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(crate::error::TransportError::RevisionConflict { expected: 0, got: 1 })
        ));
    }

    #[tokio::test]
    async fn save_snapshot_then_load_round_trips() {
        let db = InMemoryDb::new();
        let mut store = RemoteStore::default();
        store.projects.insert("api".into(), Project::new("api"));
        let saved = db.save_snapshot("user:u1", "api", 0, store).await.unwrap();
        assert_eq!(saved.revision, 1);

        let loaded = db.load_snapshot("user:u1", "api").await.unwrap().unwrap();
        assert_eq!(loaded.revision, 1);
        assert!(loaded.store.projects.contains_key("api"));
    }
}
