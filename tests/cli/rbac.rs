//! S4 — RBAC denial for a team-owned project (spec.md 8, scenario S4).

use crate::support::commands::*;
use crate::support::Test;

#[test]
fn reader_can_read_but_not_write() {
    let (t, phrase) = Test::init();

    // The device itself is the default actor and becomes team admin.
    assert_success(&t.run_as(&phrase, &["team", "create", "core"]));
    assert_success(&t.run_as(&phrase, &["project", "create", "api", "--team", "core"]));
    assert_success(&t.run_as(&phrase, &["project", "use", "api"]));
    assert_success(&t.run_as(&phrase, &["set", "TOKEN", "abc"]));
    assert_success(&t.run_as(&phrase, &["team", "add-member", "core", "viewer", "reader"]));

    assert_success(&t.run_as_actor(&phrase, "viewer", &["get", "TOKEN"]));
    assert_success(&t.run_as_actor(&phrase, "viewer", &["list"]));

    for args in [
        &["set", "TOKEN", "xyz"][..],
        &["rotate", "TOKEN", "xyz"][..],
        &["delete", "TOKEN"][..],
        &["rollback", "TOKEN", "--version", "1"][..],
        &["push"][..],
        &["env", "create", "staging"][..],
    ] {
        let output = t.run_as_actor(&phrase, "viewer", args);
        assert_failure(&output);
        assert!(
            stderr(&output).contains("lacks role"),
            "expected unauthorized for {args:?}, got: {}",
            stderr(&output)
        );
    }
}

#[test]
fn project_without_team_allows_any_actor() {
    let (t, phrase) = Test::init();
    assert_success(&t.run_as(&phrase, &["project", "create", "api"]));
    assert_success(&t.run_as(&phrase, &["project", "use", "api"]));

    let output = t.run_as_actor(&phrase, "anybody", &["set", "TOKEN", "abc"]);
    assert_success(&output);
}

#[test]
fn writer_role_alias_canonicalizes_to_maintainer() {
    let (t, phrase) = Test::init();
    assert_success(&t.run_as(&phrase, &["team", "create", "core"]));
    assert_success(&t.run_as(&phrase, &["project", "create", "api", "--team", "core"]));
    assert_success(&t.run_as(&phrase, &["project", "use", "api"]));
    assert_success(&t.run_as(&phrase, &["team", "add-member", "core", "editor", "writer"]));

    let output = t.run_as_actor(&phrase, "editor", &["set", "TOKEN", "abc"]);
    assert_success(&output);
}
