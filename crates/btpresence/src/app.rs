//! One observation run, from configuration to the written report.
//!
//! Every step reports failures as [`PresenceError`], so the binary can log a
//! stable error code before exiting non-zero.

use std::future::Future;

use btpresence_core::{
    write_report, Config, PresenceError, PresenceTracker, Report, Scanner, TrackerHandle,
    DEFAULT_QUEUE_CAPACITY,
};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::cli::Cli;
use crate::driver::{self, ObservationSummary, ObservationWindow};

/// Load configuration, then apply and validate command-line overrides.
///
/// # Errors
///
/// Returns a configuration error if loading fails or the overridden values
/// are invalid.
pub fn load_config(cli: &Cli) -> Result<Config, PresenceError> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    let effective = config.to_toml_string()?;
    debug!(config = %effective, "Effective configuration");
    Ok(config)
}

/// Open the BlueZ adapter selected by `config`.
///
/// # Errors
///
/// Returns a Bluetooth error if bluetoothd is unreachable or the adapter is
/// missing or powered off.
#[cfg(feature = "bluetooth")]
pub async fn open_scanner(config: &Config) -> Result<Box<dyn Scanner>, PresenceError> {
    let scanner = btpresence_core::BluezScanner::new(&config.scanner).await?;
    Ok(Box::new(scanner))
}

/// Open the scripted scanner named by `BTPRESENCE_MOCK_SCRIPT`.
///
/// # Errors
///
/// Returns [`PresenceError::BluetoothInitFailed`] if the script is unreadable.
#[cfg(not(feature = "bluetooth"))]
#[allow(clippy::unused_async)]
pub async fn open_scanner(_config: &Config) -> Result<Box<dyn Scanner>, PresenceError> {
    let scanner = btpresence_core::MockScanner::from_env()?;
    Ok(Box::new(scanner))
}

/// Scan for the window given on the command line, then write the report.
///
/// # Errors
///
/// Returns an error if the tracker stops or the report cannot be written.
pub async fn run<S, F>(
    scanner: &mut S,
    cli: &Cli,
    config: &Config,
    run_id: Uuid,
    shutdown: F,
) -> Result<ObservationSummary, PresenceError>
where
    S: Scanner + ?Sized,
    F: Future<Output = ()>,
{
    let tracker = TrackerHandle::spawn(
        PresenceTracker::with_config(&config.tracker),
        DEFAULT_QUEUE_CAPACITY,
    );

    let window = ObservationWindow {
        duration: cli.duration,
        pause: config.scanner.pause(),
    };
    let summary = driver::observe(
        scanner,
        &tracker,
        window,
        &config.tracker.unknown_name,
        shutdown,
    )
    .await?;

    let devices = tracker.shutdown().await?;
    let report = Report::new(
        run_id,
        summary.started_at,
        summary.finished_at,
        devices,
        config,
    );
    write_report(&report, &cli.output, cli.report_format())?;

    info!(path = %cli.output.display(), "Report generated");
    Ok(summary)
}

/// Log a fatal error with its code.
pub fn report_failure(err: &PresenceError) {
    error!(
        code = err.error_code(),
        category = failure_category(err),
        error = %err,
        "btpresence failed"
    );
}

/// Coarse grouping of a fatal error.
#[must_use]
pub const fn failure_category(err: &PresenceError) -> &'static str {
    if err.is_config_error() {
        "config"
    } else if err.is_bluetooth_error() {
        "bluetooth"
    } else if err.is_io_error() {
        "io"
    } else {
        "internal"
    }
}
