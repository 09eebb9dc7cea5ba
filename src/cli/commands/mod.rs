//! Command dispatch and shared helpers (spec.md 6).

mod completions;
mod doctor;
mod env;
mod phrase;
mod project;
mod secret;
mod session_cmds;
mod sync;
mod team;

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::cli::args::Command;
use crate::core::state::{self, State};
use crate::error::Result;

pub fn execute(command: Command) -> Result<()> {
    match command {
        Command::Init => init(),
        Command::Login { token } => session_cmds::login(token),
        Command::Logout => session_cmds::logout(),
        Command::Whoami => session_cmds::whoami(),
        Command::Doctor { json } => doctor::run(json),
        Command::Restore => restore(),
        Command::Project { action } => project::execute(action),
        Command::Team { action } => team::execute(action),
        Command::Env { action } => env::execute(action),
        Command::Set {
            key,
            value,
            expires_at,
        } => secret::set(&key, &value, expires_at.as_deref()),
        Command::Rotate { key, value } => secret::rotate(&key, &value),
        Command::Get { key } => secret::get(&key),
        Command::Delete { key } => secret::delete(&key),
        Command::List { show } => secret::list(show),
        Command::Load => secret::load(),
        Command::Import { path } => secret::import(&path),
        Command::Export { path } => secret::export(&path),
        Command::History { key } => secret::history(&key),
        Command::Rollback { key, version } => secret::rollback(&key, version),
        Command::Diff => sync::diff(),
        Command::Push { force } => sync::push(force),
        Command::Pull { force_remote } => sync::pull(force_remote),
        Command::Phrase { action } => phrase::execute(action),
        Command::Completions { shell } => completions::execute(shell),
    }
}

fn init() -> Result<()> {
    if state::state_path()?.exists() {
        return Err(crate::error::ConfigError::AlreadyInitialized.into());
    }

    let phrase = crate::core::crypto::generate_phrase(12);
    let mut new_state = State::new();
    let salt = new_state.salt()?;
    let key = crate::core::crypto::derive_key(&phrase, &salt)?;
    new_state.set_key_check(&crate::core::crypto::key_check(&key));

    state::ensure_config_dir()?;
    state::save_state(&new_state)?;
    crate::core::keychain::put("phrase", &phrase)?;

    audit("init", Some(&new_state), Map::new());

    crate::cli::output::success("vault initialized");
    crate::cli::output::kv("device", &new_state.device_id);
    println!();
    println!("Recovery phrase (write this down, it is shown only once):");
    println!();
    println!("  {phrase}");
    println!();
    crate::cli::output::warn("anyone with this phrase can decrypt every secret you sync");
    Ok(())
}

/// Re-derive the local key-check from a freshly entered phrase, recovering
/// a device after `state.json` was lost (spec.md 6, `restore`).
fn restore() -> Result<()> {
    let phrase = dialoguer::Password::new()
        .with_prompt("Recovery phrase")
        .interact()
        .map_err(|e| crate::error::Error::Other(format!("failed to read phrase: {e}")))?;

    let mut new_state = State::new();
    let salt = new_state.salt()?;
    let key = crate::core::crypto::derive_key(&phrase, &salt)?;
    new_state.set_key_check(&crate::core::crypto::key_check(&key));

    state::ensure_config_dir()?;
    state::save_state(&new_state)?;
    crate::core::keychain::put("phrase", &phrase)?;

    audit("restore", Some(&new_state), Map::new());
    crate::cli::output::success("local state restored; run `envsync pull` to fetch projects");
    Ok(())
}

/// Load state, resolving the active project via the explicit selection,
/// then the working-directory binding map, then the `.envsync.json`
/// ancestor marker (spec.md 6, "Auto-project marker"). The resolution is
/// in-memory only for callers that don't intend to persist it.
pub(crate) fn load_state_with_auto_project() -> Result<State> {
    let mut loaded = state::load_state()?;
    if loaded.current_project.is_some() {
        return Ok(loaded);
    }

    let cwd = std::env::current_dir().map_err(crate::error::Error::Io)?;
    if let Some(bound) = loaded.project_bindings.get(&cwd.display().to_string()) {
        if loaded.projects.contains_key(bound) {
            loaded.current_project = Some(bound.clone());
            return Ok(loaded);
        }
    }

    if let Some(name) = find_project_marker(&cwd) {
        if loaded.projects.contains_key(&name) {
            loaded.current_project = Some(name);
        }
    }
    Ok(loaded)
}

fn find_project_marker(start: &Path) -> Option<String> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        let marker = d.join(".envsync.json");
        if let Ok(raw) = std::fs::read_to_string(&marker) {
            if let Ok(value) = serde_json::from_str::<Value>(&raw) {
                if let Some(name) = value.get("project").and_then(|v| v.as_str()) {
                    return Some(name.to_string());
                }
            }
        }
        dir = d.parent();
    }
    None
}

/// Record an audit event, never failing the calling command (spec.md 4.7).
pub(crate) fn audit(action: &str, state: Option<&State>, fields: Map<String, Value>) {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    crate::core::audit::record(state, &cwd, action, fields);
}

pub(crate) fn require_project<'a>(state: &'a State) -> Result<&'a crate::core::model::Project> {
    state.active_project()
}

pub(crate) fn check_rbac(
    state: &State,
    project: &crate::core::model::Project,
    action: crate::core::rbac::Action,
) -> Result<()> {
    let actor = crate::core::rbac::resolve_actor(state);
    crate::core::rbac::check(state, project, &actor, action)
}
