//! Exit status of the `btpresence` binary.

use std::path::Path;
use std::process::{Command, Output};

fn btpresence(args: &[&str], envs: &[(&str, &Path)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_btpresence"));
    command
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("BTPRESENCE_LOG_LEVEL")
        .env_remove("BTPRESENCE_LOG_DIR")
        .env_remove("BTPRESENCE_MOCK_SCRIPT");
    for (key, value) in envs {
        command.env(key, value);
    }
    command.output().unwrap()
}

#[test]
fn test_invalid_configuration_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report.txt");

    let output = btpresence(&["1", report.to_str().unwrap(), "--gap", "0"], &[]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("CONFIG_VALIDATION_ERROR"));
    assert!(!report.exists());
}

#[test]
fn test_rejected_duration_exits_nonzero() {
    let output = btpresence(&["18446744073709551615", "report.txt"], &[]);
    assert!(!output.status.success());
}

#[cfg(feature = "bluetooth")]
#[test]
fn test_unusable_adapter_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report.txt");

    let output = btpresence(
        &["1", report.to_str().unwrap(), "--adapter", "hci-missing"],
        &[],
    );

    assert!(!output.status.success());
    assert!(!report.exists());
}

#[cfg(not(feature = "bluetooth"))]
#[test]
fn test_unreadable_scan_script_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report.txt");
    let script = dir.path().join("missing.json");

    let output = btpresence(
        &["1", report.to_str().unwrap()],
        &[("BTPRESENCE_MOCK_SCRIPT", script.as_path())],
    );

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("BLUETOOTH_INIT_FAILED"));
    assert!(!report.exists());
}

#[cfg(not(feature = "bluetooth"))]
#[test]
fn test_scripted_run_writes_report_and_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report.txt");
    let script = dir.path().join("script.json");
    std::fs::write(
        &script,
        r#"[[{"address": "AA:BB:CC:DD:EE:01", "name": "Phone", "rssi": -40}]]"#,
    )
    .unwrap();

    let output = btpresence(
        &["1", report.to_str().unwrap()],
        &[("BTPRESENCE_MOCK_SCRIPT", script.as_path())],
    );

    assert!(output.status.success());
    let text = std::fs::read_to_string(&report).unwrap();
    assert!(text.contains("Device Name: Phone"));
    assert!(text.contains("MAC Address: AA:BB:CC:DD:EE:01"));
}
