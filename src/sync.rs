//! Sync engine (C5): per-project, per-environment reconciliation between the
//! local [`State`] and a [`Remote`] backend (spec.md 4.5).

use std::collections::BTreeSet;

use crate::core::model::{Environment, Project, SecretRecord};
use crate::core::state::State;
use crate::error::{Result, SyncError};
use crate::remote::{self, Remote};

/// Outcome of a successful [`push`] or [`pull`]: which keys moved and what
/// the remote's new revision is.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub updated_keys: Vec<String>,
    pub remote_revision: u64,
}

/// One key's diff classification (spec.md 4.5, "Diff").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffClass {
    RemoteOnly,
    LocalOnly,
    Ahead,
    Behind,
    Differs,
    Same,
}

#[derive(Debug)]
pub struct DiffEntry {
    pub key: String,
    pub class: DiffClass,
}

fn conflicts(local_env: &Environment, remote_env: &Environment) -> Vec<String> {
    let mut keys: BTreeSet<&String> = local_env.vars.keys().collect();
    keys.extend(remote_env.vars.keys());

    keys.into_iter()
        .filter(|k| {
            let rc = remote_env.vars.get(*k).map_or(0, |r| r.current_version);
            let lc = local_env.vars.get(*k).map_or(0, |l| l.current_version);
            let ls = local_env
                .vars
                .get(*k)
                .map_or(0, |l| l.last_synced_remote_version);
            rc > ls && lc > ls
        })
        .cloned()
        .collect()
}

/// Push the active project's active environment to the remote (spec.md
/// 4.5, "Push"). `force` makes the local record win every conflicting key
/// instead of aborting.
pub fn push(state: &mut State, remote: &dyn Remote, force: bool) -> Result<SyncReport> {
    let project_name = state
        .current_project
        .clone()
        .ok_or(crate::error::ConfigError::NoActiveProject)?;
    let env_name = state.current_env.clone();

    let mut remote_store = remote.load()?;
    remote::validate_remote_crypto(state, &remote_store)?;

    let local_project = state
        .projects
        .get(&project_name)
        .ok_or_else(|| crate::error::SecretError::ProjectNotFound(project_name.clone()))?
        .clone();
    let local_env = local_project
        .envs
        .get(&env_name)
        .cloned()
        .unwrap_or_default();

    let remote_project = remote_store
        .projects
        .entry(project_name.clone())
        .or_insert_with(|| Project::new(&project_name));
    let remote_env = remote_project.envs.entry(env_name.clone()).or_default();

    let conflicting = conflicts(&local_env, remote_env);
    if !conflicting.is_empty() && !force {
        let mut sorted = conflicting;
        sorted.sort();
        return Err(SyncError::PushConflict(sorted).into());
    }
    let conflict_set: BTreeSet<String> = conflicting.into_iter().collect();

    let mut updated = Vec::new();
    for (key, local_record) in local_env.vars.iter() {
        let rc = remote_env.vars.get(key).map_or(0, |r| r.current_version);
        let lc = local_record.current_version;
        let is_conflict = conflict_set.contains(key);
        if is_conflict || lc >= rc {
            remote_env.vars.insert(key.clone(), local_record.clone());
            updated.push(key.clone());
        }
    }

    remote_project.team = local_project.team.clone();
    remote_store.teams = state.teams.clone();
    remote::attach_local_crypto(state, &mut remote_store);

    let expected_revision = remote_store.revision;
    remote.save(&remote_store, expected_revision)?;

    if let Some(project) = state.projects.get_mut(&project_name) {
        let env = project.envs.entry(env_name).or_default();
        for key in &updated {
            if let Some(record) = env.vars.get_mut(key) {
                record.last_synced_remote_version = record.current_version;
            }
        }
    }

    Ok(SyncReport {
        updated_keys: updated,
        remote_revision: expected_revision + 1,
    })
}

/// Pull the remote project's environment into local state (spec.md 4.5,
/// "Pull"). `force_remote` makes the remote record win every conflicting
/// key instead of aborting.
pub fn pull(state: &mut State, remote: &dyn Remote, force_remote: bool) -> Result<SyncReport> {
    let project_name = state
        .current_project
        .clone()
        .ok_or(crate::error::ConfigError::NoActiveProject)?;
    let env_name = state.current_env.clone();

    let remote_store = remote.load()?;
    remote::validate_remote_crypto(state, &remote_store)?;

    let remote_project = remote_store.projects.get(&project_name);
    let remote_env = remote_project
        .and_then(|p| p.envs.get(&env_name))
        .cloned()
        .unwrap_or_default();

    let local_project = state
        .projects
        .entry(project_name.clone())
        .or_insert_with(|| Project::new(&project_name));
    let local_env = local_project.envs.entry(env_name).or_default();

    let conflicting = conflicts(local_env, &remote_env);
    if !conflicting.is_empty() && !force_remote {
        let mut sorted = conflicting;
        sorted.sort();
        return Err(SyncError::PullConflict(sorted).into());
    }
    let conflict_set: BTreeSet<String> = conflicting.into_iter().collect();

    let mut updated = Vec::new();
    for (key, remote_record) in remote_env.vars.iter() {
        let rc = remote_record.current_version;
        let lc = local_env.vars.get(key).map_or(0, |l| l.current_version);
        let is_conflict = conflict_set.contains(key);
        let local_absent = !local_env.vars.contains_key(key);
        if is_conflict || rc >= lc || local_absent {
            let mut record = remote_record.clone();
            record.last_synced_remote_version = rc;
            local_env.vars.insert(key.clone(), record);
            updated.push(key.clone());
        }
    }

    if let Some(project) = remote_project {
        if project.team.is_some() {
            local_project.team = project.team.clone();
        }
    }
    if !remote_store.teams.is_empty() {
        state.teams = remote_store.teams.clone();
    }

    Ok(SyncReport {
        updated_keys: updated,
        remote_revision: remote_store.revision,
    })
}

/// Enumerate `(local, remote)` state per key without requiring the phrase
/// (spec.md 4.5, "Diff"). Classifies ciphertext presence and version
/// ordering only; never decrypts.
pub fn diff(state: &State, remote: &dyn Remote) -> Result<Vec<DiffEntry>> {
    let project_name = state
        .current_project
        .clone()
        .ok_or(crate::error::ConfigError::NoActiveProject)?;
    let env_name = state.current_env.clone();

    let remote_store = remote.load()?;
    let remote_env = remote_store
        .projects
        .get(&project_name)
        .and_then(|p| p.envs.get(&env_name))
        .cloned()
        .unwrap_or_default();

    let empty_local = Environment::default();
    let local_env = state
        .projects
        .get(&project_name)
        .and_then(|p| p.envs.get(&env_name))
        .unwrap_or(&empty_local);

    let mut keys: BTreeSet<&String> = local_env.vars.keys().collect();
    keys.extend(remote_env.vars.keys());

    let mut entries: Vec<DiffEntry> = keys
        .into_iter()
        .map(|key| {
            let class = classify(local_env.vars.get(key), remote_env.vars.get(key));
            DiffEntry {
                key: key.clone(),
                class,
            }
        })
        .collect();
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(entries)
}

fn classify(local: Option<&SecretRecord>, remote: Option<&SecretRecord>) -> DiffClass {
    match (local, remote) {
        (None, Some(_)) => DiffClass::RemoteOnly,
        (Some(_), None) => DiffClass::LocalOnly,
        (None, None) => DiffClass::Same,
        (Some(l), Some(r)) => {
            if l.current_version > r.current_version {
                DiffClass::Ahead
            } else if l.current_version < r.current_version {
                DiffClass::Behind
            } else {
                let l_hash = l.current().and_then(|v| v.plain_hash.as_deref());
                let r_hash = r.current().and_then(|v| v.plain_hash.as_deref());
                if l_hash != r_hash {
                    DiffClass::Differs
                } else {
                    DiffClass::Same
                }
            }
        }
    }
}
