//! Integration tests for the CLI commands

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_version_command() {
    let mut cmd = cargo_bin_cmd!("ocrgrid");
    cmd.arg("version");

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("ocrgrid "));
}

#[test]
fn test_version_flag() {
    let mut cmd = cargo_bin_cmd!("ocrgrid");
    cmd.arg("--version");

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("ocrgrid "));
}

#[test]
fn test_extract_missing_image() {
    let mut cmd = cargo_bin_cmd!("ocrgrid");
    cmd.args(["extract", "/nonexistent/scan.png"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Cannot open image"));
}

#[test]
fn test_extract_with_unreachable_engine() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("scan.png");
    std::fs::write(&image, b"not really a png").unwrap();
    let output = dir.path().join("out.xlsx");

    // bind then release a port so nothing is listening on it
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let mut cmd = cargo_bin_cmd!("ocrgrid");
    cmd.arg("extract")
        .arg(&image)
        .arg("-o")
        .arg(&output)
        .args(["--engine-host", "127.0.0.1", "--engine-port", &port.to_string()])
        .args(["--timeout", "2"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("recognition failed"));
    assert!(!output.exists());
}

#[test]
fn test_bad_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("ocrgrid.toml");
    std::fs::write(&config, "[engine]\nmode = \"carrier-pigeon\"\n").unwrap();

    let mut cmd = cargo_bin_cmd!("ocrgrid");
    cmd.arg("--config").arg(&config).arg("version");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config file"));
}
