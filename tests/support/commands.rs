//! Command helper methods for `Test`.

use super::Test;
use assert_cmd::Command;
use std::process::Output;

impl Test {
    /// Build an `envsync` command isolated to this test's home/cwd.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("envsync").expect("failed to find envsync binary");
        cmd.env("HOME", self.home.path());
        cmd.env("XDG_CONFIG_HOME", self.home.path().join(".config"));
        cmd.env_remove("ENVSYNC_REMOTE_MODE");
        cmd.env_remove("ENVSYNC_REMOTE_URL");
        cmd.env_remove("ENVSYNC_CLOUD_URL");
        cmd.current_dir(self.cwd.path());
        cmd
    }

    /// Same as [`Test::cmd`] but with the recovery phrase exported so the
    /// command doesn't need the keychain.
    pub fn cmd_with_phrase(&self, phrase: &str) -> Command {
        let mut cmd = self.cmd();
        cmd.env("ENVSYNC_RECOVERY_PHRASE", phrase);
        cmd
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.cmd().args(args).output().expect("failed to run envsync")
    }

    pub fn run_as(&self, phrase: &str, args: &[&str]) -> Output {
        self.cmd_with_phrase(phrase)
            .args(args)
            .output()
            .expect("failed to run envsync")
    }

    pub fn run_as_actor(&self, phrase: &str, actor: &str, args: &[&str]) -> Output {
        self.cmd_with_phrase(phrase)
            .env("ENVSYNC_ACTOR", actor)
            .args(args)
            .output()
            .expect("failed to run envsync")
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

pub fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "expected success, got exit {:?}\nstdout: {}\nstderr: {}",
        output.status.code(),
        stdout(output),
        stderr(output)
    );
}

pub fn assert_failure(output: &Output) {
    assert!(
        !output.status.success(),
        "expected failure, got success\nstdout: {}",
        stdout(output)
    );
}
