//! `doctor` diagnostics (spec.md 4.10).

use crate::support::commands::*;
use crate::support::Test;

#[test]
fn doctor_before_init_reports_config_dir_missing_but_does_not_crash() {
    let t = Test::new();
    let output = t.run(&["doctor"]);
    assert_failure(&output);
    assert!(stdout(&output).contains("config_dir") || stderr(&output).contains("config_dir"));
}

#[test]
fn doctor_json_after_init_reports_ok_checks() {
    let (t, phrase) = Test::init();
    assert_success(&t.run_as(&phrase, &["project", "create", "api"]));
    assert_success(&t.run_as(&phrase, &["project", "use", "api"]));

    let output = t.run_as(&phrase, &["doctor", "--json"]);
    assert_success(&output);
    let parsed: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("doctor --json should be valid JSON");
    assert_eq!(parsed["ok"], true);
    assert!(parsed["checks"].as_array().unwrap().iter().any(|c| c["name"] == "state_loads"));
}
