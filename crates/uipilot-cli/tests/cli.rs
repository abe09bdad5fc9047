use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use std::process::{Child, Stdio};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn uipilot() -> Command {
    let mut cmd = Command::cargo_bin("uipilot").unwrap();
    cmd.env_remove("UIPILOT_SOCKET")
        .env_remove("UIPILOT_HISTORY_SIZE")
        .env_remove("UIPILOT_MAX_REQUEST_BYTES");
    cmd
}

struct Daemon(Child);

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn spawn_daemon(config: &Path, socket: &Path, fixture: &Path) -> Daemon {
    let child = std::process::Command::new(assert_cmd::cargo::cargo_bin("uipilot"))
        .arg("--config")
        .arg(config)
        .arg("--socket")
        .arg(socket)
        .arg("serve")
        .arg("--fixture")
        .arg(fixture)
        .env_remove("UIPILOT_SOCKET")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    for _ in 0..200 {
        if socket.exists() {
            break;
        }
        thread::sleep(Duration::from_millis(25));
    }
    Daemon(child)
}

#[test]
fn test_config_prints_file_values() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "history_size = 7\n[defaults]\nwait_timeout_ms = 250\n").unwrap();

    uipilot()
        .arg("--config")
        .arg(&config)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("history_size = 7"))
        .stdout(predicate::str::contains("wait_timeout_ms = 250"));
}

#[test]
fn test_send_without_server_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "").unwrap();

    uipilot()
        .arg("--config")
        .arg(&config)
        .arg("--socket")
        .arg(dir.path().join("missing.sock"))
        .args(["send", r#"{"op":"ping"}"#])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to connect"));
}

#[test]
fn test_serve_and_send_round_trip() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "").unwrap();
    let fixture = dir.path().join("screen.json");
    std::fs::write(
        &fixture,
        r#"{"package":"com.example","class":"android.widget.FrameLayout","bounds":[0,0,1080,1920],
            "children":[{"text":"OK","resourceId":"com.example:id/ok","clickable":true,"bounds":[0,0,200,100]}]}"#,
    )
    .unwrap();
    let socket = dir.path().join("ui.sock");
    let _daemon = spawn_daemon(&config, &socket, &fixture);

    let send = |request: &str| {
        let mut cmd = uipilot();
        cmd.arg("--config")
            .arg(&config)
            .arg("--socket")
            .arg(&socket)
            .args(["send", request]);
        cmd
    };

    send(r#"{"op":"ping"}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("pong"));

    send(r#"{"op":"find","selector":{"resourceId":"com.example:id/ok"}}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""nodeId":"0""#));

    send(r#"{"op":"action","target":{"nodeId":"4"},"action":"click"}"#)
        .assert()
        .failure()
        .stdout(predicate::str::contains("NOT_FOUND"));
}
