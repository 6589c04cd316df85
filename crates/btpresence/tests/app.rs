//! Tests for a full run: configuration, scanning and the written report.

use std::io::Write;
use std::path::Path;

use btpresence::app::{failure_category, load_config, run};
use btpresence::cli::Cli;
use btpresence_core::{Config, MockDevice, MockScanner, PresenceError};
use clap::Parser;
use tokio_test::assert_ok;
use uuid::Uuid;

fn cli(args: &[&str]) -> Cli {
    let mut argv = vec!["btpresence"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

fn output(dir: &Path, name: &str) -> String {
    dir.join(name).display().to_string()
}

fn scanner() -> MockScanner {
    MockScanner::new()
        .round(vec![
            MockDevice::new("AA:BB:CC:DD:EE:01", Some("Phone")),
            MockDevice::new("AA:BB:CC:DD:EE:02", None),
        ])
        .round(vec![MockDevice::new("AA:BB:CC:DD:EE:01", Some("Phone"))])
}

#[tokio::test(start_paused = true)]
async fn test_run_writes_text_report() {
    let dir = tempfile::tempdir().unwrap();
    let path = output(dir.path(), "report.txt");
    let cli = cli(&["30s", path.as_str()]);
    let mut scanner = scanner();

    let summary = assert_ok!(
        run(
            &mut scanner,
            &cli,
            &Config::default(),
            Uuid::nil(),
            std::future::pending()
        )
        .await
    );
    assert_eq!(summary.sightings, 3);

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("Bluetooth Devices Report"));
    assert!(text.contains("Device Name: Phone"));
    assert!(text.contains("Device Name: [unknown]"));
    assert!(text.contains("MAC Address: AA:BB:CC:DD:EE:02"));
}

#[tokio::test(start_paused = true)]
async fn test_run_writes_pdf_report() {
    let dir = tempfile::tempdir().unwrap();
    let path = output(dir.path(), "report.pdf");
    let cli = cli(&["30s", path.as_str()]);
    let mut scanner = scanner();

    run(
        &mut scanner,
        &cli,
        &Config::default(),
        Uuid::nil(),
        std::future::pending(),
    )
    .await
    .unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
}

#[tokio::test(start_paused = true)]
async fn test_unwritable_report_is_an_io_failure() {
    let dir = tempfile::tempdir().unwrap();
    // The output path is an existing directory.
    let path = dir.path().display().to_string();
    let cli = cli(&["10s", path.as_str()]);
    let mut scanner = scanner();

    let err = run(
        &mut scanner,
        &cli,
        &Config::default(),
        Uuid::nil(),
        std::future::pending(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PresenceError::IoError(_)));
    assert_eq!(err.error_code(), "IO_ERROR");
    assert_eq!(failure_category(&err), "io");
}

#[test]
fn test_load_config_applies_overrides() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[tracker]\ngap_threshold_secs = 90").unwrap();
    let config_path = file.path().display().to_string();
    let config_path = config_path.as_str();

    let config = load_config(&cli(&["60", "out.txt", "--config", config_path])).unwrap();
    assert_eq!(config.tracker.gap_threshold_secs, 90);

    let config = load_config(&cli(&[
        "60",
        "out.txt",
        "--config",
        config_path,
        "--gap",
        "15",
    ]))
    .unwrap();
    assert_eq!(config.tracker.gap_threshold_secs, 15);
}

#[test]
fn test_invalid_override_is_a_config_failure() {
    let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    let config_path = file.path().display().to_string();
    let config_path = config_path.as_str();

    let err = load_config(&cli(&[
        "60",
        "out.txt",
        "--config",
        config_path,
        "--gap",
        "0",
    ]))
    .unwrap_err();

    assert_eq!(err.error_code(), "CONFIG_VALIDATION_ERROR");
    assert_eq!(failure_category(&err), "config");
}

#[test]
fn test_missing_config_file_is_a_config_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = output(dir.path(), "missing.toml");
    let config_path = config_path.as_str();

    let err = load_config(&cli(&["60", "out.txt", "--config", config_path])).unwrap_err();
    assert_eq!(err.error_code(), "CONFIG_NOT_FOUND");
}

#[test]
fn test_unreadable_scan_script_is_a_bluetooth_failure() {
    let dir = tempfile::tempdir().unwrap();
    let err = PresenceError::from(
        MockScanner::from_json_file(&dir.path().join("missing.json")).unwrap_err(),
    );

    assert_eq!(err.error_code(), "BLUETOOTH_INIT_FAILED");
    assert_eq!(failure_category(&err), "bluetooth");
}
