//! S1 — init/set/get/rollback (spec.md 8, scenario S1).

use crate::support::commands::*;
use crate::support::Test;

#[test]
fn set_get_rotate_rollback_round_trip() {
    let (t, phrase) = Test::init();

    assert_success(&t.run_as(&phrase, &["project", "create", "api"]));
    assert_success(&t.run_as(&phrase, &["project", "use", "api"]));

    assert_success(&t.run_as(&phrase, &["set", "TOKEN", "abc"]));
    let get1 = t.run_as(&phrase, &["get", "TOKEN"]);
    assert_success(&get1);
    assert_eq!(stdout(&get1).trim(), "abc");

    assert_success(&t.run_as(&phrase, &["set", "TOKEN", "def"]));
    let get2 = t.run_as(&phrase, &["get", "TOKEN"]);
    assert_eq!(stdout(&get2).trim(), "def");

    assert_success(&t.run_as(&phrase, &["rollback", "TOKEN", "--version", "1"]));
    let get3 = t.run_as(&phrase, &["get", "TOKEN"]);
    assert_eq!(stdout(&get3).trim(), "abc");
}

#[test]
fn delete_then_get_reports_deleted() {
    let (t, phrase) = Test::init();
    assert_success(&t.run_as(&phrase, &["project", "create", "api"]));
    assert_success(&t.run_as(&phrase, &["project", "use", "api"]));
    assert_success(&t.run_as(&phrase, &["set", "TOKEN", "abc"]));
    assert_success(&t.run_as(&phrase, &["delete", "TOKEN"]));

    let output = t.run_as(&phrase, &["get", "TOKEN"]);
    assert_failure(&output);
    assert!(stderr(&output).contains("deleted"));
}

#[test]
fn list_masks_values_unless_show() {
    let (t, phrase) = Test::init();
    assert_success(&t.run_as(&phrase, &["project", "create", "api"]));
    assert_success(&t.run_as(&phrase, &["project", "use", "api"]));
    assert_success(&t.run_as(&phrase, &["set", "TOKEN", "abc"]));

    let masked = t.run_as(&phrase, &["list"]);
    assert_success(&masked);
    assert!(!stdout(&masked).contains("abc"));

    let shown = t.run_as(&phrase, &["list", "--show"]);
    assert_success(&shown);
    assert!(stdout(&shown).contains("TOKEN=abc"));
}

#[test]
fn wrong_phrase_is_rejected() {
    let (t, phrase) = Test::init();
    assert_success(&t.run_as(&phrase, &["project", "create", "api"]));
    assert_success(&t.run_as(&phrase, &["project", "use", "api"]));
    assert_success(&t.run_as(&phrase, &["set", "TOKEN", "abc"]));

    let output = t.run_as("totally the wrong phrase words here", &["get", "TOKEN"]);
    assert_failure(&output);
}

#[test]
fn load_emits_export_lines() {
    let (t, phrase) = Test::init();
    assert_success(&t.run_as(&phrase, &["project", "create", "api"]));
    assert_success(&t.run_as(&phrase, &["project", "use", "api"]));
    assert_success(&t.run_as(&phrase, &["set", "TOKEN", "abc"]));

    let output = t.run_as(&phrase, &["load"]);
    assert_success(&output);
    assert_eq!(stdout(&output).trim(), r#"export TOKEN="abc""#);
}

#[test]
fn history_lists_versions() {
    let (t, phrase) = Test::init();
    assert_success(&t.run_as(&phrase, &["project", "create", "api"]));
    assert_success(&t.run_as(&phrase, &["project", "use", "api"]));
    assert_success(&t.run_as(&phrase, &["set", "TOKEN", "abc"]));
    assert_success(&t.run_as(&phrase, &["rotate", "TOKEN", "def"]));

    let output = t.run_as(&phrase, &["history", "TOKEN"]);
    assert_success(&output);
    let out = stdout(&output);
    assert!(out.contains("v1"));
    assert!(out.contains("v2"));
}
