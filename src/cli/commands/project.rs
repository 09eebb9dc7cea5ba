//! `project {create|list|use|delete}`.

use serde_json::Map;

use crate::cli::args::ProjectAction;
use crate::core::model::Project;
use crate::core::rbac::Action;
use crate::core::state;
use crate::error::{Result, SecretError, ValidationError};

use super::{audit, check_rbac};

pub fn execute(action: ProjectAction) -> Result<()> {
    match action {
        ProjectAction::Create { name, team } => create(&name, team.as_deref()),
        ProjectAction::List => list(),
        ProjectAction::Use { name } => use_project(&name),
        ProjectAction::Delete { name } => delete(&name),
    }
}

/// Project names must match `^[a-z0-9][a-z0-9_-]{0,62}$` (spec.md 4.8,
/// carried over to the local CLI for consistency with the cloud service).
fn validate_project_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit())
        && name.len() <= 63
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidProject(name.to_string()).into())
    }
}

fn create(name: &str, team: Option<&str>) -> Result<()> {
    validate_project_name(name)?;
    let mut state = state::load_state()?;
    if state.projects.contains_key(name) {
        return Err(SecretError::ProjectAlreadyExists(name.to_string()).into());
    }
    if let Some(team_name) = team {
        if !state.teams.contains_key(team_name) {
            return Err(SecretError::TeamNotFound(team_name.to_string()).into());
        }
    }

    let mut project = Project::new(name);
    project.team = team.map(str::to_string);
    state.projects.insert(name.to_string(), project);
    state.current_project = Some(name.to_string());
    state::save_state(&state)?;

    let mut fields = Map::new();
    fields.insert("project".into(), name.into());
    audit("project_create", Some(&state), fields);

    crate::cli::output::success(&format!("created project '{name}'"));
    Ok(())
}

fn list() -> Result<()> {
    let state = state::load_state()?;
    let mut names: Vec<&String> = state.projects.keys().collect();
    names.sort();
    for name in names {
        let marker = if state.current_project.as_deref() == Some(name) {
            "* "
        } else {
            "  "
        };
        crate::cli::output::data(&format!("{marker}{name}"));
    }
    Ok(())
}

fn use_project(name: &str) -> Result<()> {
    let mut state = state::load_state()?;
    let project = state
        .projects
        .get(name)
        .ok_or_else(|| SecretError::ProjectNotFound(name.to_string()))?;
    check_rbac(&state, project, Action::ProjectUse)?;

    state.current_project = Some(name.to_string());
    state::save_state(&state)?;
    crate::cli::output::success(&format!("switched to project '{name}'"));
    Ok(())
}

fn delete(name: &str) -> Result<()> {
    let mut state = state::load_state()?;
    let project = state
        .projects
        .get(name)
        .ok_or_else(|| SecretError::ProjectNotFound(name.to_string()))?;
    check_rbac(&state, project, Action::ProjectDelete)?;

    state.projects.remove(name);
    if state.current_project.as_deref() == Some(name) {
        state.current_project = None;
    }
    state::save_state(&state)?;

    let mut fields = Map::new();
    fields.insert("project".into(), name.into());
    audit("project_delete", Some(&state), fields);

    crate::cli::output::success(&format!("deleted project '{name}'"));
    Ok(())
}
