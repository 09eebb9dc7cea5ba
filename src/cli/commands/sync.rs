//! `diff`, `push`, `pull` (spec.md 4.5, 4.6).

use serde_json::Map;

use crate::core::rbac::Action;
use crate::core::state;
use crate::error::Result;
use crate::sync::{self, DiffClass};

use super::{audit, check_rbac, load_state_with_auto_project, require_project};

pub fn diff() -> Result<()> {
    let loaded_state = load_state_with_auto_project()?;
    let project = require_project(&loaded_state)?;
    check_rbac(&loaded_state, project, Action::Diff)?;

    let remote = crate::remote::open()?;
    let entries = sync::diff(&loaded_state, remote.as_ref())?;
    if entries.is_empty() {
        crate::cli::output::data("no keys in this environment, local or remote");
        return Ok(());
    }
    for entry in entries {
        let symbol = match entry.class {
            DiffClass::RemoteOnly => "+remote",
            DiffClass::LocalOnly => "+local",
            DiffClass::Ahead => "↑ ahead",
            DiffClass::Behind => "↓ behind",
            DiffClass::Differs => "≠ differs",
            DiffClass::Same => continue,
        };
        crate::cli::output::data(&format!("{symbol}\t{}", entry.key));
    }
    Ok(())
}

pub fn push(force: bool) -> Result<()> {
    let mut loaded_state = load_state_with_auto_project()?;
    {
        let project = require_project(&loaded_state)?;
        check_rbac(&loaded_state, project, Action::Push)?;
    }

    let remote = crate::remote::open()?;
    let report = sync::push(&mut loaded_state, remote.as_ref(), force)?;
    state::save_state(&loaded_state)?;

    let mut fields = Map::new();
    fields.insert("updated_keys".into(), report.updated_keys.clone().into());
    fields.insert("remote_revision".into(), report.remote_revision.into());
    audit("push", Some(&loaded_state), fields);

    crate::cli::output::success(&format!(
        "pushed {} key(s); remote is now at revision {}",
        report.updated_keys.len(),
        report.remote_revision
    ));
    Ok(())
}

pub fn pull(force_remote: bool) -> Result<()> {
    let mut loaded_state = load_state_with_auto_project()?;
    {
        let project = require_project(&loaded_state)?;
        check_rbac(&loaded_state, project, Action::Pull)?;
    }

    let remote = crate::remote::open()?;
    let report = sync::pull(&mut loaded_state, remote.as_ref(), force_remote)?;
    state::save_state(&loaded_state)?;

    let mut fields = Map::new();
    fields.insert("updated_keys".into(), report.updated_keys.clone().into());
    fields.insert("remote_revision".into(), report.remote_revision.into());
    audit("pull", Some(&loaded_state), fields);

    crate::cli::output::success(&format!(
        "pulled {} key(s) from remote revision {}",
        report.updated_keys.len(),
        report.remote_revision
    ));
    Ok(())
}
