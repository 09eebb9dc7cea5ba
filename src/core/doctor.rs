//! Doctor & permissions (C10): a pure read path over state, the vault, and
//! the configured remote, used by the `doctor` CLI command.
//!
//! Every check is independent: one failing check does not stop the rest
//! from running, so a single `doctor` invocation surfaces every problem it
//! can find in one pass (spec.md 4.10).

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::core::keychain;
use crate::core::state::{self, State};
use crate::remote::file::FileRemote;

/// One diagnostic check result.
#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: String,
    pub ok: bool,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Check {
    fn pass(name: &str, details: impl Into<String>) -> Self {
        Check {
            name: name.to_string(),
            ok: true,
            details: details.into(),
            hint: None,
        }
    }

    fn fail(name: &str, details: impl Into<String>, hint: Option<&str>) -> Self {
        Check {
            name: name.to_string(),
            ok: false,
            details: details.into(),
            hint: hint.map(str::to_string),
        }
    }
}

/// Full diagnostic report. `ok` is true only if every check passed.
#[derive(Debug, Serialize)]
pub struct Report {
    pub ok: bool,
    pub checks: Vec<Check>,
}

/// Run every doctor check. Never returns `Err` — a check that can't run
/// (e.g. state doesn't load) is reported as a failed check, not an error,
/// since the whole point of `doctor` is to work when the rest of envsync
/// can't.
pub fn run() -> Report {
    let mut checks = Vec::new();

    let config_dir = check_config_dir();
    let config_dir_ok = config_dir.ok;
    checks.push(config_dir);

    let state = check_state_loads(&mut checks);

    check_active_project(&mut checks, state.as_ref());
    check_remote(&mut checks, state.as_ref());
    check_recovery_phrase(&mut checks);
    if config_dir_ok {
        check_permissions(&mut checks);
    }

    let ok = checks.iter().all(|c| c.ok);
    Report { ok, checks }
}

fn check_config_dir() -> Check {
    match state::config_dir() {
        Ok(dir) if dir.is_dir() => Check::pass("config_dir", dir.display().to_string()),
        Ok(dir) => Check::fail(
            "config_dir",
            format!("{} does not exist", dir.display()),
            Some("run 'envsync init'"),
        ),
        Err(e) => Check::fail("config_dir", e.to_string(), None),
    }
}

fn check_state_loads(checks: &mut Vec<Check>) -> Option<State> {
    match state::load_state() {
        Ok(state) => {
            checks.push(Check::pass(
                "state_loads",
                format!("schema version {}", state.schema_version),
            ));
            Some(state)
        }
        Err(e) => {
            checks.push(Check::fail(
                "state_loads",
                e.to_string(),
                e.hint(),
            ));
            None
        }
    }
}

fn check_active_project(checks: &mut Vec<Check>, state: Option<&State>) {
    let Some(state) = state else {
        checks.push(Check::fail(
            "active_project",
            "state did not load",
            None,
        ));
        checks.push(Check::fail(
            "active_environment",
            "state did not load",
            None,
        ));
        return;
    };

    match state.active_project() {
        Ok(project) => {
            checks.push(Check::pass(
                "active_project",
                format!("'{}' ({} environments)", project.name, project.envs.len()),
            ));
            if project.envs.contains_key(&state.current_env) {
                checks.push(Check::pass(
                    "active_environment",
                    format!("'{}'", state.current_env),
                ));
            } else {
                checks.push(Check::fail(
                    "active_environment",
                    format!(
                        "environment '{}' not found in project '{}'",
                        state.current_env, project.name
                    ),
                    Some("run 'envsync env use <name>'"),
                ));
            }
        }
        Err(e) => {
            checks.push(Check::fail("active_project", e.to_string(), e.hint()));
            checks.push(Check::fail(
                "active_environment",
                "no active project",
                None,
            ));
        }
    }
}

/// Reports the configured remote mode/target and, for reachable transports,
/// whether a request actually succeeds. Mirrors the precedence used by
/// `crate::remote` to pick a transport, without importing it, since doctor
/// must run even when remote configuration is broken.
fn check_remote(checks: &mut Vec<Check>, state: Option<&State>) {
    let mode = std::env::var("ENVSYNC_REMOTE_MODE").ok();
    let file_target = std::env::var("ENVSYNC_REMOTE_FILE").ok();
    let http_target = std::env::var("ENVSYNC_REMOTE_URL").ok();
    let cloud_target = std::env::var("ENVSYNC_CLOUD_URL").ok();

    let (kind, target) = match mode.as_deref() {
        Some("file") => ("file", file_target.clone()),
        Some("http") => ("http", http_target.clone()),
        Some("cloud") => ("cloud", cloud_target.clone()),
        _ if http_target.is_some() => ("http", http_target.clone()),
        _ if cloud_target.is_some() => ("cloud", cloud_target.clone()),
        _ => ("file", file_target.clone()),
    };

    checks.push(Check::pass(
        "remote_target",
        match &target {
            Some(t) => format!("mode={kind} target={t}"),
            None => format!("mode={kind} target=<default>"),
        },
    ));

    let reachable = match kind {
        "file" => {
            let path = file_target
                .map(std::path::PathBuf::from)
                .or_else(|| state.map(|_| default_file_remote_path()))
                .unwrap_or_else(default_file_remote_path);
            check_file_remote_reachable(&path)
        }
        "http" => match &http_target {
            Some(url) => check_http_remote_reachable(url),
            None => Check::fail("remote_reachable", "ENVSYNC_REMOTE_URL not set", None),
        },
        "cloud" => match keychain::get("session") {
            Ok(Some(_)) => Check::pass("remote_reachable", "session present"),
            Ok(None) => Check::fail(
                "remote_reachable",
                "no active session",
                Some("run 'envsync login'"),
            ),
            Err(e) => Check::fail("remote_reachable", e.to_string(), None),
        },
        _ => unreachable!(),
    };
    checks.push(reachable);
}

fn default_file_remote_path() -> std::path::PathBuf {
    FileRemote::default_path().unwrap_or_else(|_| std::path::PathBuf::from("remote_store.json"))
}

fn check_file_remote_reachable(path: &Path) -> Check {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => Check::fail(
            "remote_reachable",
            format!("directory {} does not exist", parent.display()),
            None,
        ),
        _ => Check::pass("remote_reachable", format!("{} is reachable", path.display())),
    }
}

fn check_http_remote_reachable(url: &str) -> Check {
    let health_url = format!("{}/healthz", url.trim_end_matches('/'));
    let client = match reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
    {
        Ok(c) => c,
        Err(e) => return Check::fail("remote_reachable", e.to_string(), None),
    };

    match client.get(&health_url).send() {
        Ok(resp) if resp.status().is_success() => {
            Check::pass("remote_reachable", format!("{health_url} responded OK"))
        }
        Ok(resp) => Check::fail(
            "remote_reachable",
            format!("{health_url} returned {}", resp.status()),
            None,
        ),
        Err(e) => Check::fail(
            "remote_reachable",
            format!("{health_url} unreachable: {e}"),
            None,
        ),
    }
}

fn check_recovery_phrase(checks: &mut Vec<Check>) {
    match keychain::resolve_phrase() {
        Ok(Some(_)) => checks.push(Check::pass("recovery_phrase", "available")),
        Ok(None) => checks.push(Check::fail(
            "recovery_phrase",
            "not set in ENVSYNC_RECOVERY_PHRASE or the keychain",
            Some("run 'envsync phrase save'"),
        )),
        Err(e) => checks.push(Check::fail("recovery_phrase", e.to_string(), None)),
    }
}

#[cfg(unix)]
fn check_permissions(checks: &mut Vec<Check>) {
    use std::os::unix::fs::PermissionsExt;

    let fix = std::env::var("ENVSYNC_FIX_PERMISSIONS")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let Ok(dir) = state::config_dir() else {
        return;
    };

    let mut problems = Vec::new();
    if let Ok(meta) = fs::metadata(&dir) {
        let mode = meta.permissions().mode() & 0o777;
        if mode != 0o700 {
            if fix {
                let _ = fs::set_permissions(&dir, fs::Permissions::from_mode(0o700));
            } else {
                problems.push(format!("{} is {:o}, expected 0700", dir.display(), mode));
            }
        }
    }

    let mut checked_paths: Vec<std::path::PathBuf> = ["state.json", "audit.log", "phrase.json", "session.json"]
        .into_iter()
        .map(|name| dir.join(name))
        .collect();

    let remote_path = default_file_remote_path();
    let mut lock_path = remote_path.as_os_str().to_owned();
    lock_path.push(".lock");
    checked_paths.push(remote_path);
    checked_paths.push(std::path::PathBuf::from(lock_path));

    for path in checked_paths {
        if let Ok(meta) = fs::metadata(&path) {
            let mode = meta.permissions().mode() & 0o777;
            if mode != 0o600 {
                if fix {
                    let _ = fs::set_permissions(&path, fs::Permissions::from_mode(0o600));
                } else {
                    problems.push(format!("{} is {:o}, expected 0600", path.display(), mode));
                }
            }
        }
    }

    if problems.is_empty() {
        checks.push(Check::pass("file_permissions", "0700/0600 as expected"));
    } else {
        checks.push(Check::fail(
            "file_permissions",
            problems.join("; "),
            Some("set ENVSYNC_FIX_PERMISSIONS=1 to repair automatically"),
        ));
    }
}

#[cfg(not(unix))]
fn check_permissions(checks: &mut Vec<Check>) {
    checks.push(Check::pass(
        "file_permissions",
        "not enforced on this platform",
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_state_reports_failed_checks_not_a_crash() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("HOME", dir.path());
        std::env::set_var("XDG_CONFIG_HOME", dir.path());
        std::env::remove_var("ENVSYNC_RECOVERY_PHRASE");

        let report = run();
        assert!(!report.ok);
        assert!(report.checks.iter().any(|c| c.name == "state_loads" && !c.ok));
    }

    #[test]
    fn file_remote_missing_dir_fails() {
        let check = check_file_remote_reachable(Path::new("/does/not/exist/remote.json"));
        assert!(!check.ok);
    }
}
