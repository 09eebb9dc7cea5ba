//! S2/S3 — push/pull against the self-hosted HTTP remote, then restore
//! a second device from the shared remote (spec.md 8, scenarios S2-S3).

mod support;

use std::net::TcpListener;
use std::process::{Child, Command};
use std::time::Duration;

use assert_cmd::cargo::cargo_bin;
use support::commands::*;
use support::Test;

struct ServerHandle {
    child: Child,
    pub addr: String,
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn spawn_server(store_path: &std::path::Path, token: &str) -> ServerHandle {
    let port = free_port();
    let addr = format!("127.0.0.1:{port}");
    let child = Command::new(cargo_bin("envsync-server"))
        .env("ENVSYNC_SERVER_ADDR", &addr)
        .env("ENVSYNC_SERVER_STORE", store_path)
        .env("ENVSYNC_SERVER_TOKEN", token)
        .spawn()
        .expect("failed to spawn envsync-server");

    let client = reqwest::blocking::Client::new();
    let url = format!("http://{addr}/healthz");
    let mut ready = false;
    for _ in 0..50 {
        if let Ok(resp) = client.get(&url).send() {
            if resp.status().is_success() {
                ready = true;
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    assert!(ready, "envsync-server did not become healthy at {url}");

    ServerHandle { child, addr }
}

#[test]
fn push_pull_round_trip_then_restore_on_a_new_machine() {
    let store_dir = tempfile::tempdir().unwrap();
    let store_path = store_dir.path().join("server_store.json");
    let server = spawn_server(&store_path, "test-token");

    let (device_a, phrase) = Test::init();
    let remote_url = format!("http://{}", server.addr);

    let mut cmd = device_a.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_MODE", "http");
    cmd.env("ENVSYNC_REMOTE_URL", &remote_url);
    cmd.env("ENVSYNC_REMOTE_TOKEN", "test-token");
    assert_success(&cmd.args(["project", "create", "api"]).output().unwrap());

    let mut cmd = device_a.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_MODE", "http");
    cmd.env("ENVSYNC_REMOTE_URL", &remote_url);
    cmd.env("ENVSYNC_REMOTE_TOKEN", "test-token");
    assert_success(&cmd.args(["project", "use", "api"]).output().unwrap());

    let mut cmd = device_a.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_MODE", "http");
    cmd.env("ENVSYNC_REMOTE_URL", &remote_url);
    cmd.env("ENVSYNC_REMOTE_TOKEN", "test-token");
    assert_success(&cmd.args(["set", "TOKEN", "abc"]).output().unwrap());

    let mut cmd = device_a.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_MODE", "http");
    cmd.env("ENVSYNC_REMOTE_URL", &remote_url);
    cmd.env("ENVSYNC_REMOTE_TOKEN", "test-token");
    let push_out = cmd.args(["push"]).output().unwrap();
    assert_success(&push_out);
    assert!(stdout(&push_out).contains("revision 1"));

    let stored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&store_path).unwrap()).unwrap();
    assert_eq!(stored["revision"], 1);
    assert_eq!(
        stored["projects"]["api"]["envs"]["dev"]["vars"]["TOKEN"]["current_version"],
        1
    );

    drop(server);

    // A fresh machine, same recovery phrase, restores from the shared
    // server-backed remote.
    let device_b = Test::new();
    let server2 = spawn_server(&store_path, "test-token");
    let remote_url2 = format!("http://{}", server2.addr);

    let mut cmd = device_b.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_MODE", "http");
    cmd.env("ENVSYNC_REMOTE_URL", &remote_url2);
    cmd.env("ENVSYNC_REMOTE_TOKEN", "test-token");
    assert_success(&cmd.args(["restore"]).output().unwrap());

    let mut cmd = device_b.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_MODE", "http");
    cmd.env("ENVSYNC_REMOTE_URL", &remote_url2);
    cmd.env("ENVSYNC_REMOTE_TOKEN", "test-token");
    assert_success(&cmd.args(["project", "create", "api"]).output().unwrap());

    let mut cmd = device_b.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_MODE", "http");
    cmd.env("ENVSYNC_REMOTE_URL", &remote_url2);
    cmd.env("ENVSYNC_REMOTE_TOKEN", "test-token");
    assert_success(&cmd.args(["project", "use", "api"]).output().unwrap());

    let mut cmd = device_b.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_MODE", "http");
    cmd.env("ENVSYNC_REMOTE_URL", &remote_url2);
    cmd.env("ENVSYNC_REMOTE_TOKEN", "test-token");
    assert_success(&cmd.args(["pull", "--force-remote"]).output().unwrap());

    let mut cmd = device_b.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_MODE", "http");
    cmd.env("ENVSYNC_REMOTE_URL", &remote_url2);
    cmd.env("ENVSYNC_REMOTE_TOKEN", "test-token");
    let get_out = cmd.args(["get", "TOKEN"]).output().unwrap();
    assert_success(&get_out);
    assert_eq!(stdout(&get_out).trim(), "abc");

    drop(server2);
}

#[test]
fn unauthenticated_push_is_rejected() {
    let store_dir = tempfile::tempdir().unwrap();
    let store_path = store_dir.path().join("server_store.json");
    let server = spawn_server(&store_path, "test-token");
    let remote_url = format!("http://{}", server.addr);

    let (device, phrase) = Test::init();
    let mut cmd = device.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_MODE", "http");
    cmd.env("ENVSYNC_REMOTE_URL", &remote_url);
    cmd.env_remove("ENVSYNC_REMOTE_TOKEN");
    assert_success(&cmd.args(["project", "create", "api"]).output().unwrap());
    let mut cmd = device.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_MODE", "http");
    cmd.env("ENVSYNC_REMOTE_URL", &remote_url);
    cmd.env_remove("ENVSYNC_REMOTE_TOKEN");
    assert_success(&cmd.args(["project", "use", "api"]).output().unwrap());

    let mut cmd = device.cmd_with_phrase(&phrase);
    cmd.env("ENVSYNC_REMOTE_MODE", "http");
    cmd.env("ENVSYNC_REMOTE_URL", &remote_url);
    cmd.env_remove("ENVSYNC_REMOTE_TOKEN");
    let push_out = cmd.args(["push"]).output().unwrap();
    assert_failure(&push_out);
}
