//! RBAC (C6): role gating per project via team membership.
//!
//! A project with no owning team grants all operations to any caller.
//! Otherwise the actor's role on the owning team gates operations
//! (spec.md 4.6).

use crate::core::model::{Project, Role, Team};
use crate::core::state::State;
use crate::error::{RbacError, Result};

/// The verb a caller is attempting. Gates match spec.md 4.6's table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Get,
    List,
    Load,
    History,
    Pull,
    ProjectUse,
    EnvUse,
    EnvList,
    Diff,
    Export,
    Set,
    Rotate,
    Delete,
    Rollback,
    Push,
    EnvCreate,
    Import,
    ProjectDelete,
    TeamAddMember,
    TeamRemoveMember,
}

impl Action {
    fn required_role(self) -> Role {
        use Action::*;
        match self {
            Get | List | Load | History | Pull | ProjectUse | EnvUse | EnvList | Diff
            | Export => Role::Reader,
            Set | Rotate | Delete | Rollback | Push | EnvCreate | Import => Role::Maintainer,
            ProjectDelete | TeamAddMember | TeamRemoveMember => Role::Admin,
        }
    }
}

/// Resolve the acting identity: `ENVSYNC_ACTOR` env var if set, else the
/// device id.
pub fn resolve_actor(state: &State) -> String {
    std::env::var("ENVSYNC_ACTOR").unwrap_or_else(|_| state.device_id.clone())
}

/// Check whether `actor` may perform `action` on `project`. A project with
/// no owning team permits any caller.
pub fn check(state: &State, project: &Project, actor: &str, action: Action) -> Result<()> {
    let Some(team_name) = &project.team else {
        return Ok(());
    };

    let team: &Team = state
        .teams
        .get(team_name)
        .ok_or_else(|| crate::error::SecretError::TeamNotFound(team_name.clone()))?;

    let required = action.required_role();
    match team.role_of(actor) {
        Some(role) if role.satisfies(required) => Ok(()),
        Some(role) => Err(RbacError::Unauthorized {
            actor: actor.to_string(),
            team: team_name.clone(),
            required: required.as_str().to_string(),
            actual: role.as_str().to_string(),
        }
        .into()),
        None => Err(RbacError::NotAMember {
            actor: actor.to_string(),
            team: team_name.clone(),
        }
        .into()),
    }
}
