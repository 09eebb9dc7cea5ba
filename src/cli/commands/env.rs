//! `env {create|use|list}`.

use serde_json::Map;

use crate::cli::args::EnvAction;
use crate::core::model::Environment;
use crate::core::rbac::Action;
use crate::core::state;
use crate::error::{Result, SecretError};

use super::{audit, check_rbac, require_project};

pub fn execute(action: EnvAction) -> Result<()> {
    match action {
        EnvAction::Create { name } => create(&name),
        EnvAction::Use { name } => use_env(&name),
        EnvAction::List => list(),
    }
}

fn create(name: &str) -> Result<()> {
    let mut state = state::load_state()?;
    let project_name = state
        .current_project
        .clone()
        .ok_or(crate::error::ConfigError::NoActiveProject)?;
    {
        let project = require_project(&state)?;
        check_rbac(&state, project, Action::EnvCreate)?;
        if project.envs.contains_key(name) {
            return Err(SecretError::EnvironmentAlreadyExists(name.to_string()).into());
        }
    }

    let project = state
        .projects
        .get_mut(&project_name)
        .ok_or_else(|| SecretError::ProjectNotFound(project_name.clone()))?;
    project.envs.insert(name.to_string(), Environment::default());
    state::save_state(&state)?;

    let mut fields = Map::new();
    fields.insert("environment".into(), name.into());
    audit("env_create", Some(&state), fields);

    crate::cli::output::success(&format!("created environment '{name}'"));
    Ok(())
}

fn use_env(name: &str) -> Result<()> {
    let mut state = state::load_state()?;
    {
        let project = require_project(&state)?;
        check_rbac(&state, project, Action::EnvUse)?;
        if !project.envs.contains_key(name) {
            return Err(SecretError::EnvironmentNotFound(name.to_string()).into());
        }
    }
    state.current_env = name.to_string();
    state::save_state(&state)?;
    crate::cli::output::success(&format!("switched to environment '{name}'"));
    Ok(())
}

fn list() -> Result<()> {
    let state = state::load_state()?;
    let project = require_project(&state)?;
    check_rbac(&state, project, Action::EnvList)?;

    let mut names: Vec<&String> = project.envs.keys().collect();
    names.sort();
    for name in names {
        let marker = if state.current_env == *name { "* " } else { "  " };
        crate::cli::output::data(&format!("{marker}{name}"));
    }
    Ok(())
}
