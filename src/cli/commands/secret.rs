//! `set`, `rotate`, `get`, `delete`, `list`, `load`, `import`, `export`,
//! `history`, `rollback` (spec.md 4.3, 4.6).

use std::fs;

use serde_json::Map;

use crate::core::rbac::Action;
use crate::core::vault::Vault;
use crate::error::Result;

use super::{audit, check_rbac, load_state_with_auto_project};

fn open_vault() -> Result<Vault> {
    Ok(Vault::from_state(load_state_with_auto_project()?))
}

pub fn set(key: &str, value: &str, expires_at: Option<&str>) -> Result<()> {
    let mut vault = open_vault()?;
    check_rbac(&vault.state, vault.state.active_project()?, Action::Set)?;
    let version = vault.set(key, value, expires_at)?;

    let mut fields = Map::new();
    fields.insert("key".into(), key.into());
    fields.insert("version".into(), version.into());
    audit("set", Some(&vault.state), fields);

    crate::cli::output::success(&format!("set {} (v{version})", crate::cli::output::key(key)));
    Ok(())
}

pub fn rotate(key: &str, value: &str) -> Result<()> {
    let mut vault = open_vault()?;
    check_rbac(&vault.state, vault.state.active_project()?, Action::Rotate)?;
    let version = vault.rotate(key, value)?;

    let mut fields = Map::new();
    fields.insert("key".into(), key.into());
    fields.insert("version".into(), version.into());
    audit("rotate", Some(&vault.state), fields);

    crate::cli::output::success(&format!(
        "rotated {} (v{version})",
        crate::cli::output::key(key)
    ));
    Ok(())
}

pub fn get(key: &str) -> Result<()> {
    let mut vault = open_vault()?;
    check_rbac(&vault.state, vault.state.active_project()?, Action::Get)?;
    let value = vault.get(key)?;

    let mut fields = Map::new();
    fields.insert("key".into(), key.into());
    audit("get", Some(&vault.state), fields);

    crate::cli::output::data(&value);
    Ok(())
}

pub fn delete(key: &str) -> Result<()> {
    let mut vault = open_vault()?;
    check_rbac(&vault.state, vault.state.active_project()?, Action::Delete)?;
    let version = vault.delete(key)?;

    let mut fields = Map::new();
    fields.insert("key".into(), key.into());
    fields.insert("version".into(), version.into());
    audit("delete", Some(&vault.state), fields);

    crate::cli::output::success(&format!("deleted {}", crate::cli::output::key(key)));
    Ok(())
}

pub fn list(show: bool) -> Result<()> {
    let mut vault = open_vault()?;
    check_rbac(&vault.state, vault.state.active_project()?, Action::List)?;
    let entries = vault.list(show)?;

    for entry in entries {
        let status = if entry.deleted {
            " (deleted)"
        } else if entry.expired {
            " (expired)"
        } else {
            ""
        };
        match (show, &entry.value) {
            (true, Some(v)) => crate::cli::output::data(&format!("{}={v}{status}", entry.key)),
            _ => crate::cli::output::data(&format!("{}{status}", entry.key)),
        }
    }
    Ok(())
}

pub fn load() -> Result<()> {
    let mut vault = open_vault()?;
    check_rbac(&vault.state, vault.state.active_project()?, Action::Load)?;
    for line in vault.load_exports()? {
        crate::cli::output::data(&line);
    }
    Ok(())
}

/// Parse a minimal `.env` grammar: blank lines and `#` comments are
/// skipped, each remaining line is split on the first `=`, and a value
/// wrapped in matching single or double quotes has them stripped (spec.md
/// 1, "minimal grammar").
fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let mut value = value.trim();
        if value.len() >= 2 {
            let bytes = value.as_bytes();
            let quoted = (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
                || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'');
            if quoted {
                value = &value[1..value.len() - 1];
            }
        }
        out.push((key.to_string(), value.to_string()));
    }
    out
}

pub fn import(path: &str) -> Result<()> {
    let mut vault = open_vault()?;
    check_rbac(&vault.state, vault.state.active_project()?, Action::Import)?;

    let contents = fs::read_to_string(path).map_err(crate::error::Error::Io)?;
    let pairs = parse_dotenv(&contents);

    let mut imported = 0u32;
    for (key, value) in &pairs {
        if value.is_empty() {
            continue;
        }
        vault.set(key, value, None)?;
        imported += 1;
    }

    let mut fields = Map::new();
    fields.insert("path".into(), path.into());
    fields.insert("count".into(), imported.into());
    audit("import", Some(&vault.state), fields);

    crate::cli::output::success(&format!("imported {imported} secret(s) from {path}"));
    Ok(())
}

pub fn export(path: &str) -> Result<()> {
    let mut vault = open_vault()?;
    check_rbac(&vault.state, vault.state.active_project()?, Action::Export)?;

    let lines = vault.load_exports()?;
    let body: String = lines
        .into_iter()
        .map(|l| l.trim_start_matches("export ").to_string())
        .collect::<Vec<_>>()
        .join("\n");
    fs::write(path, format!("{body}\n")).map_err(crate::error::Error::Io)?;

    let mut fields = Map::new();
    fields.insert("path".into(), path.into());
    audit("export", Some(&vault.state), fields);

    crate::cli::output::success(&format!("exported to {path}"));
    Ok(())
}

pub fn history(key: &str) -> Result<()> {
    let vault = open_vault()?;
    check_rbac(&vault.state, vault.state.active_project()?, Action::History)?;
    for entry in vault.history(key)? {
        crate::cli::output::data(&format!(
            "v{}\t{}\t{}\t{}",
            entry.version,
            entry.status,
            entry.updated_at.to_rfc3339(),
            entry.device_id
        ));
    }
    Ok(())
}

pub fn rollback(key: &str, version: u64) -> Result<()> {
    let mut vault = open_vault()?;
    check_rbac(&vault.state, vault.state.active_project()?, Action::Rollback)?;
    let new_version = vault.rollback(key, version)?;

    let mut fields = Map::new();
    fields.insert("key".into(), key.into());
    fields.insert("from_version".into(), version.into());
    fields.insert("to_version".into(), new_version.into());
    audit("rollback", Some(&vault.state), fields);

    crate::cli::output::success(&format!(
        "rolled back {} to v{version} (new v{new_version})",
        crate::cli::output::key(key)
    ));
    Ok(())
}
