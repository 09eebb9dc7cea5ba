//! Test support utilities for envsync integration tests.

#![allow(dead_code)]

pub mod commands;

use tempfile::TempDir;

/// An isolated test environment: its own config dir (via `XDG_CONFIG_HOME`
/// / `HOME`) and its own working directory, so tests can run in parallel
/// without touching the developer's real `~/.config/envsync`.
pub struct Test {
    pub home: TempDir,
    pub cwd: TempDir,
}

impl Test {
    pub fn new() -> Self {
        let home = TempDir::new().expect("failed to create temp home");
        let cwd = TempDir::new().expect("failed to create temp cwd");
        Test { home, cwd }
    }

    /// Create a test environment with a vault initialized and the
    /// recovery phrase captured for later commands via
    /// `ENVSYNC_RECOVERY_PHRASE`.
    pub fn init() -> (Self, String) {
        let t = Self::new();
        let output = t.cmd().arg("init").output().expect("failed to run envsync init");
        assert!(
            output.status.success(),
            "init failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let phrase = stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && l.split_whitespace().count() >= 6)
            .unwrap_or_else(|| panic!("could not find recovery phrase in init output:\n{stdout}"))
            .to_string();
        (t, phrase)
    }
}
