//! `env {create|use|list}` and import/export (spec.md 4.3, 6).

use std::fs;

use crate::support::commands::*;
use crate::support::Test;

#[test]
fn environments_are_isolated_per_project() {
    let (t, phrase) = Test::init();
    assert_success(&t.run_as(&phrase, &["project", "create", "api"]));
    assert_success(&t.run_as(&phrase, &["project", "use", "api"]));
    assert_success(&t.run_as(&phrase, &["set", "TOKEN", "dev-value"]));

    assert_success(&t.run_as(&phrase, &["env", "create", "prod"]));
    assert_success(&t.run_as(&phrase, &["env", "use", "prod"]));

    let missing = t.run_as(&phrase, &["get", "TOKEN"]);
    assert_failure(&missing);

    assert_success(&t.run_as(&phrase, &["set", "TOKEN", "prod-value"]));
    let got = t.run_as(&phrase, &["get", "TOKEN"]);
    assert_eq!(stdout(&got).trim(), "prod-value");

    assert_success(&t.run_as(&phrase, &["env", "use", "dev"]));
    let got_dev = t.run_as(&phrase, &["get", "TOKEN"]);
    assert_eq!(stdout(&got_dev).trim(), "dev-value");
}

#[test]
fn import_then_export_round_trips_a_dotenv_file() {
    let (t, phrase) = Test::init();
    assert_success(&t.run_as(&phrase, &["project", "create", "api"]));
    assert_success(&t.run_as(&phrase, &["project", "use", "api"]));

    let src = t.cwd.path().join("input.env");
    fs::write(&src, "# comment\nDATABASE_URL=postgres://localhost/db\nEMPTY=\nQUOTED=\"hello world\"\n").unwrap();

    let import_out = t.run_as(&phrase, &["import", src.to_str().unwrap()]);
    assert_success(&import_out);
    assert!(stdout(&import_out).contains("imported 2"));

    let out_path = t.cwd.path().join("output.env");
    assert_success(&t.run_as(&phrase, &["export", out_path.to_str().unwrap()]));

    let exported = fs::read_to_string(&out_path).unwrap();
    assert!(exported.contains(r#"DATABASE_URL="postgres://localhost/db""#));
    assert!(exported.contains(r#"QUOTED="hello world""#));
}
