//! S1-flavored tests for `envsync init`.

use crate::support::commands::*;
use crate::support::Test;

#[test]
fn init_creates_state_and_prints_phrase() {
    let t = Test::new();
    let output = t.run(&["init"]);
    assert_success(&output);
    let out = stdout(&output);
    assert!(out.contains("Recovery phrase"));

    let state_path = t.home.path().join(".config/envsync/state.json");
    assert!(state_path.exists(), "state.json should exist after init");
}

#[test]
fn second_init_fails_already_initialized() {
    let t = Test::new();
    assert_success(&t.run(&["init"]));

    let output = t.run(&["init"]);
    assert_failure(&output);
    assert!(stderr(&output).contains("already initialized"));
}

#[test]
fn commands_before_init_report_not_initialized() {
    let t = Test::new();
    let output = t.run(&["project", "list"]);
    assert_failure(&output);
    assert!(stderr(&output).contains("not initialized"));
}
