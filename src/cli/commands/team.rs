//! `team {create|list|use|add-member|remove-member|list-members}`.

use serde_json::Map;

use crate::cli::args::TeamAction;
use crate::core::model::{Role, Team};
use crate::core::rbac::{self, Action};
use crate::core::state;
use crate::error::{Error, RbacError, Result, SecretError, ValidationError};

use super::audit;

pub fn execute(action: TeamAction) -> Result<()> {
    match action {
        TeamAction::Create { name } => create(&name),
        TeamAction::List => list(),
        TeamAction::Use { name } => use_team(&name),
        TeamAction::AddMember { team, actor, role } => add_member(&team, &actor, &role),
        TeamAction::RemoveMember { team, actor } => remove_member(&team, &actor),
        TeamAction::ListMembers { team } => list_members(team.as_deref()),
    }
}

fn create(name: &str) -> Result<()> {
    let mut state = state::load_state()?;
    if state.teams.contains_key(name) {
        return Err(SecretError::TeamAlreadyExists(name.to_string()).into());
    }
    let actor = rbac::resolve_actor(&state);
    state.teams.insert(name.to_string(), Team::new(name, &actor));
    state.current_team = Some(name.to_string());
    state::save_state(&state)?;

    let mut fields = Map::new();
    fields.insert("team".into(), name.into());
    audit("team_create", Some(&state), fields);

    crate::cli::output::success(&format!("created team '{name}' ({actor} is admin)"));
    Ok(())
}

fn list() -> Result<()> {
    let state = state::load_state()?;
    let mut names: Vec<&String> = state.teams.keys().collect();
    names.sort();
    for name in names {
        let marker = if state.current_team.as_deref() == Some(name) {
            "* "
        } else {
            "  "
        };
        crate::cli::output::data(&format!("{marker}{name}"));
    }
    Ok(())
}

fn use_team(name: &str) -> Result<()> {
    let mut state = state::load_state()?;
    if !state.teams.contains_key(name) {
        return Err(SecretError::TeamNotFound(name.to_string()).into());
    }
    state.current_team = Some(name.to_string());
    state::save_state(&state)?;
    crate::cli::output::success(&format!("switched to team '{name}'"));
    Ok(())
}

/// Team membership is gated through whichever projects the team owns: the
/// caller must hold `admin` on that team per any project it owns, or the
/// team owns no project yet, in which case only its own admins may act
/// (spec.md 4.6, `TeamAddMember`/`TeamRemoveMember` are admin-only).
fn require_team_admin(state: &crate::core::state::State, team_name: &str) -> Result<()> {
    let team = state
        .teams
        .get(team_name)
        .ok_or_else(|| SecretError::TeamNotFound(team_name.to_string()))?;
    let actor = rbac::resolve_actor(state);

    if let Some(project) = state
        .projects
        .values()
        .find(|p| p.team.as_deref() == Some(team_name))
    {
        return rbac::check(state, project, &actor, Action::TeamAddMember);
    }

    match team.role_of(&actor) {
        Some(Role::Admin) => Ok(()),
        Some(role) => Err(RbacError::Unauthorized {
            actor,
            team: team_name.to_string(),
            required: Role::Admin.as_str().to_string(),
            actual: role.as_str().to_string(),
        }
        .into()),
        None => Err(RbacError::NotAMember {
            actor,
            team: team_name.to_string(),
        }
        .into()),
    }
}

fn add_member(team_name: &str, actor_id: &str, role: &str) -> Result<()> {
    let mut state = state::load_state()?;
    require_team_admin(&state, team_name)?;

    let role = Role::parse(role).ok_or_else(|| ValidationError::InvalidRole(role.to_string()))?;
    let team = state
        .teams
        .get_mut(team_name)
        .ok_or_else(|| SecretError::TeamNotFound(team_name.to_string()))?;
    team.members.insert(actor_id.to_string(), role);
    state::save_state(&state)?;

    let mut fields = Map::new();
    fields.insert("team".into(), team_name.into());
    fields.insert("actor".into(), actor_id.into());
    fields.insert("role".into(), role.as_str().into());
    audit("team_add_member", Some(&state), fields);

    crate::cli::output::success(&format!(
        "added '{actor_id}' to '{team_name}' as {}",
        role.as_str()
    ));
    Ok(())
}

fn remove_member(team_name: &str, actor_id: &str) -> Result<()> {
    let mut state = state::load_state()?;
    require_team_admin(&state, team_name)?;

    let team = state
        .teams
        .get_mut(team_name)
        .ok_or_else(|| SecretError::TeamNotFound(team_name.to_string()))?;
    team.members.remove(actor_id);
    state::save_state(&state)?;

    let mut fields = Map::new();
    fields.insert("team".into(), team_name.into());
    fields.insert("actor".into(), actor_id.into());
    audit("team_remove_member", Some(&state), fields);

    crate::cli::output::success(&format!("removed '{actor_id}' from '{team_name}'"));
    Ok(())
}

fn list_members(team_name: Option<&str>) -> Result<()> {
    let state = state::load_state()?;
    let name = team_name
        .map(str::to_string)
        .or_else(|| state.current_team.clone())
        .ok_or_else(|| Error::Other("no team specified and no active team selected".into()))?;
    let team = state
        .teams
        .get(&name)
        .ok_or_else(|| SecretError::TeamNotFound(name.clone()))?;

    for (actor, role) in &team.members {
        crate::cli::output::data(&format!("{actor}\t{}", role.as_str()));
    }
    Ok(())
}
