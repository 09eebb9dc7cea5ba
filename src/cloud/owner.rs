//! Project name normalization and owner resolution (spec.md 4.8).

use uuid::Uuid;

use crate::core::model::Role;
use crate::error::{CloudError, Result};

use super::db::CloudDb;

/// `^[a-z0-9][a-z0-9_-]{0,62}$`, matching the CLI's own project-name
/// validator (`cli::commands::project::validate_project_name`).
fn matches_project_shape(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit())
        && name.len() <= 63
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// Lowercase, trim, default to `"default"`, validate against
/// `^[a-z0-9][a-z0-9_-]{0,62}$`.
pub fn normalize_project(raw: Option<&str>) -> Result<String> {
    let trimmed = raw.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("default");
    let normalized = trimmed.to_ascii_lowercase();
    if !matches_project_shape(&normalized) {
        return Err(CloudError::InvalidProject(normalized).into());
    }
    Ok(normalized)
}

/// Query params this handler reads for owner resolution.
#[derive(Debug, Default)]
pub struct OwnerParams {
    pub organization_id: Option<String>,
    pub team_id: Option<String>,
}

/// Resolve the storage owner key for a request, enforcing the
/// `organization_id`/`team_id` mutual exclusion and membership/role check
/// (spec.md 4.8, "Owner resolution"). `principal_user_id` is `None` for the
/// legacy bare-uuid GET fallback, which this function does not itself
/// construct — callers resolve that case directly against the store.
pub async fn resolve_owner_key(
    db: &dyn CloudDb,
    principal_user_id: Uuid,
    params: &OwnerParams,
    required: Role,
) -> Result<String> {
    match (&params.organization_id, &params.team_id) {
        (Some(_), Some(_)) => Err(CloudError::OwnerConflict.into()),
        (None, None) => Ok(format!("user:{principal_user_id}")),
        (Some(org_id), None) => {
            let owner_key = format!("org:{org_id}");
            require_role(db, principal_user_id, &owner_key, required).await?;
            Ok(owner_key)
        }
        (None, Some(team_id)) => {
            let owner_key = format!("team:{team_id}");
            require_role(db, principal_user_id, &owner_key, required).await?;
            Ok(owner_key)
        }
    }
}

async fn require_role(db: &dyn CloudDb, user_id: Uuid, owner_key: &str, required: Role) -> Result<()> {
    match db.membership_role(user_id, owner_key).await? {
        Some(role) if role >= required => Ok(()),
        Some(_) => Err(crate::error::AuthError::ForbiddenScope(format!(
            "requires role >= {} on {owner_key}",
            required.as_str()
        ))
        .into()),
        None => Err(crate::error::AuthError::ForbiddenScope(format!("not a member of {owner_key}")).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize_project(Some("  My-App ")).unwrap(), "my-app");
    }

    #[test]
    fn empty_defaults_to_default() {
        assert_eq!(normalize_project(None).unwrap(), "default");
        assert_eq!(normalize_project(Some("   ")).unwrap(), "default");
    }

    #[test]
    fn rejects_invalid_characters() {
        assert!(normalize_project(Some("../etc")).is_err());
        assert!(normalize_project(Some("_leading-underscore")).is_err());
    }

    #[tokio::test]
    async fn organization_and_team_are_mutually_exclusive() {
        let db = super::super::db::memory::InMemoryDb::new();
        let params = OwnerParams {
            organization_id: Some("11111111-1111-1111-1111-111111111111".into()),
            team_id: Some("22222222-2222-2222-2222-222222222222".into()),
        };
        let err = resolve_owner_key(&db, Uuid::nil(), &params, Role::Reader)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::Error::Cloud(CloudError::OwnerConflict)));
    }

    #[tokio::test]
    async fn no_owner_params_resolves_to_the_user() {
        let db = super::super::db::memory::InMemoryDb::new();
        let user_id = Uuid::new_v4();
        let key = resolve_owner_key(&db, user_id, &OwnerParams::default(), Role::Reader)
            .await
            .unwrap();
        assert_eq!(key, format!("user:{user_id}"));
    }
}
