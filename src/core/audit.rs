//! Audit log (C7): append-only JSON lines with size/age rotation and
//! retention pruning.
//!
//! Failures to write are silently swallowed — audit must never break an
//! operation (spec.md 4.7).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde_json::{Map, Value};

use crate::core::state::{config_dir, State};

const DEFAULT_MAX_BYTES: u64 = 1024 * 1024;
const DEFAULT_MAX_AGE_SECS: u64 = 24 * 60 * 60;
const DEFAULT_RETENTION_DAYS: u64 = 30;
const DEFAULT_MAX_FILES: usize = 5;

fn max_bytes() -> u64 {
    std::env::var("ENVSYNC_AUDIT_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_BYTES)
}

fn max_age() -> Duration {
    std::env::var("ENVSYNC_AUDIT_ROTATE_INTERVAL")
        .ok()
        .and_then(|v| humantime_secs(&v))
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(DEFAULT_MAX_AGE_SECS))
}

fn retention_days() -> u64 {
    std::env::var("ENVSYNC_AUDIT_RETENTION_DAYS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_RETENTION_DAYS)
}

fn max_files() -> usize {
    std::env::var("ENVSYNC_AUDIT_MAX_FILES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_FILES)
}

/// Parse a handful of duration shapes (`24h`, `3600s`, plain seconds) for
/// audit rotation env vars, without pulling in a duration-string crate.
fn humantime_secs(s: &str) -> Option<u64> {
    if let Ok(n) = s.parse::<u64>() {
        return Some(n);
    }
    let s = s.trim();
    let digits_end = s.find(|c: char| !c.is_ascii_digit())?;
    let (num, unit) = s.split_at(digits_end);
    let num: u64 = num.parse().ok()?;
    match unit {
        "s" => Some(num),
        "m" => Some(num * 60),
        "h" => Some(num * 3600),
        "d" => Some(num * 86400),
        _ => None,
    }
}

pub fn audit_log_path() -> Option<PathBuf> {
    config_dir().ok().map(|d| d.join("audit.log"))
}

/// Append one structured audit line. `action` names the verb; `fields` are
/// merged in as action-specific context (e.g. `key`, `version`). Never
/// returns an error to the caller — see module docs.
pub fn record(state: Option<&State>, cwd: &Path, action: &str, fields: Map<String, Value>) {
    let Some(path) = audit_log_path() else {
        return;
    };
    let _ = try_record(&path, state, cwd, action, fields);
}

fn try_record(
    path: &Path,
    state: Option<&State>,
    cwd: &Path,
    action: &str,
    fields: Map<String, Value>,
) -> std::io::Result<()> {
    let mut entry = Map::new();
    entry.insert(
        "ts".into(),
        Value::String(chrono::Utc::now().to_rfc3339()),
    );
    entry.insert("action".into(), Value::String(action.to_string()));
    entry.insert("cwd".into(), Value::String(cwd.display().to_string()));

    if let Some(state) = state {
        let actor = crate::core::rbac::resolve_actor(state);
        entry.insert("actor".into(), Value::String(actor));
        entry.insert("device_id".into(), Value::String(state.device_id.clone()));
        if let Some(team) = &state.current_team {
            entry.insert("team".into(), Value::String(team.clone()));
        }
        if let Some(project) = &state.current_project {
            entry.insert("project".into(), Value::String(project.clone()));
        }
        entry.insert(
            "environment".into(),
            Value::String(state.current_env.clone()),
        );
    }

    for (k, v) in fields {
        entry.insert(k, v);
    }

    let line = serde_json::to_string(&Value::Object(entry))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    maybe_rotate(path, line.len() as u64 + 1)?;

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = file.set_permissions(fs::Permissions::from_mode(0o600));
    }
    writeln!(file, "{line}")?;
    Ok(())
}

fn maybe_rotate(path: &Path, incoming_len: u64) -> std::io::Result<()> {
    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return Ok(()),
    };
    if meta.len() == 0 {
        return Ok(());
    }

    let too_big = meta.len() + incoming_len > max_bytes();
    let too_old = meta
        .modified()
        .ok()
        .and_then(|m| SystemTime::now().duration_since(m).ok())
        .is_some_and(|age| age > max_age());

    if !too_big && !too_old {
        return Ok(());
    }

    rotate(path)?;
    prune(path)?;
    Ok(())
}

fn rotated_path(path: &Path, n: usize) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(format!(".{n}"));
    PathBuf::from(s)
}

fn rotate(path: &Path) -> std::io::Result<()> {
    let n = max_files();
    let last = rotated_path(path, n);
    if last.exists() {
        fs::remove_file(&last)?;
    }
    for i in (1..n).rev() {
        let from = rotated_path(path, i);
        let to = rotated_path(path, i + 1);
        if from.exists() {
            fs::rename(&from, &to)?;
        }
    }
    if n >= 1 {
        fs::rename(path, rotated_path(path, 1))?;
    }
    Ok(())
}

fn prune(path: &Path) -> std::io::Result<()> {
    let retention = Duration::from_secs(retention_days() * 86400);
    for i in 1..=max_files() {
        let rotated = rotated_path(path, i);
        if let Ok(meta) = fs::metadata(&rotated) {
            if let Ok(modified) = meta.modified() {
                if SystemTime::now()
                    .duration_since(modified)
                    .is_ok_and(|age| age > retention)
                {
                    let _ = fs::remove_file(&rotated);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn rotates_when_over_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        fs::write(&path, "x".repeat(10)).unwrap();

        std::env::set_var("ENVSYNC_AUDIT_MAX_BYTES", "5");
        let mut fields = Map::new();
        fields.insert("key".into(), Value::String("TOKEN".into()));
        try_record(&path, None, Path::new("/tmp"), "set", fields).unwrap();
        std::env::remove_var("ENVSYNC_AUDIT_MAX_BYTES");

        assert!(rotated_path(&path, 1).exists());
        assert!(path.exists());
        // Small sleep avoids flakiness from filesystem mtime resolution in CI.
        sleep(std::time::Duration::from_millis(1));
    }

    #[test]
    fn records_include_core_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let mut fields = Map::new();
        fields.insert("key".into(), Value::String("TOKEN".into()));
        try_record(&path, None, Path::new("/work"), "get", fields).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let line: Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
        assert_eq!(line["action"], "get");
        assert_eq!(line["cwd"], "/work");
        assert_eq!(line["key"], "TOKEN");
    }
}
