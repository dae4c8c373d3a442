//! CLI integration tests
//!
//! Tests the radb binary using assert_cmd, with a fake device agent on a
//! local TCP port standing in for the tunnel.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::Path;
use std::thread::{self, JoinHandle};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};

fn radb() -> Command {
    Command::cargo_bin("radb")
        .expect("Failed to locate radb binary - ensure it's built before running tests")
}

/// Accept one connection, greet, and answer each request with the next frame
fn fake_agent(responses: Vec<&'static str>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let handle = thread::spawn(move || {
        let (socket, _) = listener.accept().unwrap();
        let mut writer = socket.try_clone().unwrap();
        let mut reader = BufReader::new(socket);
        writer
            .write_all(b"{\"type\":\"welcome\",\"version\":\"1.0\",\"mode\":\"shizuku\"}\n")
            .unwrap();

        let mut requests = Vec::new();
        for response in responses {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap() == 0 {
                break;
            }
            requests.push(line.trim_end().to_string());
            writer.write_all(response.as_bytes()).unwrap();
            writer.write_all(b"\n").unwrap();
        }

        // Hold the socket until the client hangs up
        let mut rest = String::new();
        while reader.read_line(&mut rest).map(|n| n > 0).unwrap_or(false) {
            rest.clear();
        }
        requests
    });

    (address, handle)
}

fn frame(line: &str) -> Value {
    serde_json::from_str(line).expect("request is JSON")
}

fn empty_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, "").unwrap();
    path
}

#[test]
fn test_cli_help() {
    radb()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("radb"))
        .stdout(predicate::str::contains("logcat"));
}

#[test]
fn test_cli_version() {
    radb()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("radb"));
}

#[test]
fn test_missing_device_is_usage_error() {
    radb().assert().code(1);
}

#[test]
fn test_push_wrong_arity_is_usage_error() {
    radb()
        .args(["abc123", "push", "only-one"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("push"));
}

#[test]
fn test_push_missing_local_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.txt");

    radb()
        .arg("abc123")
        .arg("push")
        .arg(&missing)
        .arg("/sdcard/missing.txt")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[tunnel\nport = ").unwrap();

    radb()
        .args(["--config"])
        .arg(&config)
        .args(["abc123", "id"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("configuration"));
}

#[test]
fn test_missing_helper_shows_install_instructions() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[tunnel]\nbinary = \"radb-test-no-such-helper\"\n").unwrap();

    radb()
        .args(["--config"])
        .arg(&config)
        .args(["abc123", "id"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("radb-test-no-such-helper"))
        .stderr(predicate::str::contains("cloudflared"));
}

#[test]
fn test_one_shot_command() {
    let (address, agent) = fake_agent(vec![
        r#"{"success":true,"output":"file1\nfile2\n","stderr":"","exitCode":0}"#,
    ]);
    let dir = tempfile::tempdir().unwrap();

    radb()
        .arg("--config")
        .arg(empty_config(dir.path()))
        .args(["--connect", &address, "abc123", "ls -la"])
        .assert()
        .success()
        .stdout("file1\nfile2\n")
        .stderr(predicate::str::contains("abc123.676967.xyz"))
        .stderr(predicate::str::contains("Connected! Mode: shizuku"));

    let requests = agent.join().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        frame(&requests[0]),
        json!({"type": "shell", "command": "ls -la"})
    );
}

#[test]
fn test_remote_exit_code_is_propagated() {
    let (address, agent) = fake_agent(vec![
        r#"{"type":"output","stdout":"","stderr":"sh: nope: not found\n","exit":3}"#,
    ]);
    let dir = tempfile::tempdir().unwrap();

    radb()
        .arg("--config")
        .arg(empty_config(dir.path()))
        .args(["--connect", &address, "--dialect", "b", "abc123", "nope"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("sh: nope: not found"));

    let requests = agent.join().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(frame(&requests[0]), json!({"type": "shell", "cmd": "nope"}));
}

#[test]
fn test_pull_writes_local_file() {
    let (address, agent) = fake_agent(vec![r#"{"success":true,"data":"aGVsbG8=\n"}"#]);
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("hello.txt");

    radb()
        .arg("--config")
        .arg(empty_config(dir.path()))
        .args(["--connect", &address, "abc123", "pull", "/sdcard/hello.txt"])
        .arg(&local)
        .assert()
        .success()
        .stdout(predicate::str::contains("Pulled /sdcard/hello.txt"));

    assert_eq!(std::fs::read(&local).unwrap(), b"hello");
    assert_eq!(agent.join().unwrap().len(), 1);
}

#[test]
fn test_push_failure_exits_nonzero() {
    let (address, _agent) = fake_agent(vec![r#"{"success":false,"error":"permission denied"}"#]);
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("a.txt");
    std::fs::write(&local, b"data").unwrap();

    radb()
        .arg("--config")
        .arg(empty_config(dir.path()))
        .args(["--connect", &address, "abc123", "push"])
        .arg(&local)
        .arg("/system/a.txt")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("permission denied"));
}

#[test]
fn test_ping() {
    let (address, agent) = fake_agent(vec![r#"{"type":"pong"}"#]);
    let dir = tempfile::tempdir().unwrap();

    radb()
        .arg("--config")
        .arg(empty_config(dir.path()))
        .args(["--connect", &address, "--ping", "abc123"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Device is alive"));

    let requests = agent.join().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(frame(&requests[0]), json!({"type": "ping"}));
}
