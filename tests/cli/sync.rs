//! Push/pull/diff against the file remote backend (spec.md 4.4.1, 4.5).
//! Exercises the same reconciliation the HTTP and cloud backends share,
//! without needing a running server.

use crate::support::commands::*;
use crate::support::Test;

#[test]
fn push_then_pull_round_trips_on_a_second_device() {
    let (device_a, phrase) = Test::init();
    let remote_path = device_a.home.path().join("shared_remote.json");

    let push = device_a
        .cmd_with_phrase(&phrase)
        .env("ENVSYNC_REMOTE_FILE", &remote_path)
        .args(["project", "create", "api"])
        .output()
        .unwrap();
    assert_success(&push);

    let mut cmd = device_a.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    assert_success(
        &cmd.args(["project", "use", "api"])
            .output()
            .unwrap(),
    );

    let mut cmd = device_a.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    assert_success(&cmd.args(["set", "TOKEN", "abc"]).output().unwrap());

    let mut cmd = device_a.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    let push_out = cmd.args(["push"]).output().unwrap();
    assert_success(&push_out);
    assert!(stdout(&push_out).contains("revision 1"));

    // A second device, same recovery phrase, pulls from the shared remote.
    let device_b = Test::new();
    let mut cmd = device_b.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    assert_success(&cmd.args(["restore"]).output().unwrap());

    // `restore` doesn't know about remote projects yet; the local stub
    // created here is overwritten key-wise by the pull below.
    let mut cmd = device_b.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    assert_success(&cmd.args(["project", "create", "api"]).output().unwrap());
    let mut cmd = device_b.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    assert_success(&cmd.args(["project", "use", "api"]).output().unwrap());
    let mut cmd = device_b.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    let pull_out = cmd.args(["pull"]).output().unwrap();
    assert_success(&pull_out);

    let mut cmd = device_b.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    let get_out = cmd.args(["get", "TOKEN"]).output().unwrap();
    assert_success(&get_out);
    assert_eq!(stdout(&get_out).trim(), "abc");
}

#[test]
fn concurrent_push_at_stale_revision_conflicts() {
    let (device_a, phrase) = Test::init();
    let remote_path = device_a.home.path().join("shared_remote.json");

    let mut cmd = device_a.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    assert_success(&cmd.args(["project", "create", "api"]).output().unwrap());
    let mut cmd = device_a.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    assert_success(&cmd.args(["project", "use", "api"]).output().unwrap());
    let mut cmd = device_a.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    assert_success(&cmd.args(["set", "TOKEN", "abc"]).output().unwrap());
    let mut cmd = device_a.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    assert_success(&cmd.args(["push"]).output().unwrap());

    // Device B restores, pulls, and pushes a conflicting change.
    let device_b = Test::new();
    let mut cmd = device_b.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    assert_success(&cmd.args(["restore"]).output().unwrap());
    let mut cmd = device_b.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    assert_success(&cmd.args(["project", "create", "api"]).output().unwrap());
    let mut cmd = device_b.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    assert_success(&cmd.args(["project", "use", "api"]).output().unwrap());
    let mut cmd = device_b.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    assert_success(&cmd.args(["pull"]).output().unwrap());

    // Both devices now change TOKEN and push: A first (succeeds), then
    // A changes it again and B's later push (against a now-stale local
    // LastSyncedRemoteVersion) should conflict without --force.
    let mut cmd = device_a.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    assert_success(&cmd.args(["set", "TOKEN", "from-a"]).output().unwrap());
    let mut cmd = device_a.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    assert_success(&cmd.args(["push"]).output().unwrap());

    let mut cmd = device_b.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    assert_success(&cmd.args(["set", "TOKEN", "from-b"]).output().unwrap());
    let mut cmd = device_b.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    let conflicting_push = cmd.args(["push"]).output().unwrap();
    assert_failure(&conflicting_push);

    let mut cmd = device_b.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    let forced_push = cmd.args(["push", "--force"]).output().unwrap();
    assert_success(&forced_push);
}

#[test]
fn diff_works_without_the_recovery_phrase() {
    let (t, phrase) = Test::init();
    let remote_path = t.home.path().join("shared_remote.json");

    let mut cmd = t.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    assert_success(&cmd.args(["project", "create", "api"]).output().unwrap());
    let mut cmd = t.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    assert_success(&cmd.args(["project", "use", "api"]).output().unwrap());
    let mut cmd = t.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    assert_success(&cmd.args(["set", "TOKEN", "abc"]).output().unwrap());

    // No ENVSYNC_RECOVERY_PHRASE set at all for the diff itself.
    let mut cmd = t.cmd();
    cmd.env("ENVSYNC_REMOTE_FILE", &remote_path);
    let diff = cmd.args(["diff"]).output().unwrap();
    assert_success(&diff);
    assert!(stdout(&diff).contains("+local"));
}
