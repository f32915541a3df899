use assert_cmd::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn repo_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("expected crates/<name> layout")
        .to_path_buf()
}

fn fixture() -> PathBuf {
    let path = repo_root()
        .join("fixtures")
        .join("session")
        .join("basic.json");
    assert!(path.exists(), "fixture missing: {}", path.display());
    path
}

fn node<'a>(snapshot: &'a Value, id: &str) -> &'a Value {
    snapshot["nodes"]
        .as_array()
        .expect("nodes array")
        .iter()
        .find(|n| n["id"] == id)
        .unwrap_or_else(|| panic!("node {id} missing"))
}

#[test]
fn cli_replays_a_recorded_session() {
    let exe = assert_cmd::cargo_bin!("topoview-cli");
    let out = Command::new(exe)
        .current_dir(repo_root())
        .args(["replay", fixture().to_string_lossy().as_ref()])
        .output()
        .expect("run topoview-cli");
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let snapshot: Value = serde_json::from_slice(&out.stdout).expect("snapshot JSON");
    assert_eq!(snapshot["cursor"], 5);
    assert_eq!(snapshot["flow_count"], 1);
    assert_eq!(snapshot["nodes"].as_array().map(Vec::len), Some(3));
    assert_eq!(snapshot["links"].as_array().map(Vec::len), Some(2));

    let edge = node(&snapshot, "1");
    assert_eq!(edge["name"], "edge-1");
    assert_eq!(edge["mode"], "AR");
    assert_eq!(edge["flows"], 1);
    let ports: Vec<_> = edge["ports"]
        .as_array()
        .expect("ports")
        .iter()
        .map(|p| p["of_port"].clone())
        .collect();
    assert_eq!(ports, [Value::from(1), Value::from(2)]);

    let core = node(&snapshot, "2");
    assert_eq!(core["name"], "core-2");
    assert_eq!(core["pinned"], true);
    assert_eq!((core["x"].as_f64(), core["y"].as_f64()), (Some(1200.0), Some(300.0)));

    let host = node(&snapshot, "h1");
    assert_eq!(host["kind"], "host");

    let link = snapshot["links"]
        .as_array()
        .and_then(|links| links.iter().find(|l| l["id"] == "link-1-2"))
        .expect("switch link");
    assert_eq!(link["bandwidth"].as_f64(), Some(1_000_000.0));
    assert_eq!(link["load"].as_f64(), Some(16.0));
}

#[test]
fn cli_reads_the_session_from_stdin() {
    let exe = assert_cmd::cargo_bin!("topoview-cli");
    let input = fs::read(fixture()).expect("read fixture");
    let assert = assert_cmd::Command::new(exe)
        .args(["--pretty", "-"])
        .write_stdin(input)
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("\n  \"cursor\": 5"), "not pretty: {stdout}");
}

#[test]
fn cli_lists_the_controller_requests() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let session = tmp.path().join("session.json");
    fs::copy(fixture(), &session).expect("copy fixture");

    let exe = assert_cmd::cargo_bin!("topoview-cli");
    let out = Command::new(exe)
        .args(["requests", session.to_string_lossy().as_ref()])
        .output()
        .expect("run topoview-cli");
    assert!(out.status.success());

    let requests: Value = serde_json::from_slice(&out.stdout).expect("requests JSON");
    let requests = requests.as_array().expect("array");
    assert_eq!(
        requests[0]["path"],
        "/timeout/switch-manager&topology&host-manager&flow-manager/0"
    );
    assert!(requests.iter().any(|r| r["path"] == "/switches/1/ports/2/"));
    assert!(
        !requests
            .iter()
            .any(|r| r["path"] == "/switches/1/ports/4294967294/"),
        "local port must not be queried"
    );
}

#[test]
fn cli_rejects_bad_config_and_bad_flags() {
    let exe = assert_cmd::cargo_bin!("topoview-cli");
    Command::new(exe)
        .args(["--config", r#"{ "scale": 0 }"#, fixture().to_string_lossy().as_ref()])
        .assert()
        .code(1);

    let exe = assert_cmd::cargo_bin!("topoview-cli");
    Command::new(exe).args(["--bogus"]).assert().code(2);
}
