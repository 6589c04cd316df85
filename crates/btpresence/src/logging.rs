//! Logging initialization and configuration.
//!
//! Logs always go to stderr so the terminal shows progress while scanning.
//! When `BTPRESENCE_LOG_DIR` is set, JSON logs are additionally written to
//! daily rolling files in that directory.
//!
//! The filter comes from `RUST_LOG`, then `BTPRESENCE_LOG_LEVEL`, then the
//! `-v` count on the command line.

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the fallback log level.
pub const LOG_LEVEL_ENV: &str = "BTPRESENCE_LOG_LEVEL";

/// Environment variable enabling file logging into the named directory.
pub const LOG_DIR_ENV: &str = "BTPRESENCE_LOG_DIR";

/// Keeps the non-blocking file writer alive for the lifetime of the program.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize logging.
///
/// # Errors
///
/// Returns an error if the filter cannot be parsed or the log directory
/// cannot be created.
pub fn init(verbosity: u8) -> anyhow::Result<()> {
    let level = std::env::var(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| default_directive(verbosity).to_string());
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&level))?;

    match std::env::var_os(LOG_DIR_ENV).map(PathBuf::from) {
        Some(dir) => init_with_file(env_filter, dir)?,
        None => init_console(env_filter),
    }

    Ok(())
}

/// Level implied by the number of `-v` flags.
#[must_use]
pub const fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Console + rolling JSON file output.
fn init_with_file(env_filter: EnvFilter, log_dir: PathBuf) -> anyhow::Result<()> {
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "btpresence");
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking_file)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    let _ = FILE_GUARD.set(file_guard);

    Ok(())
}

/// Console output only.
fn init_console(env_filter: EnvFilter) {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_follows_verbosity() {
        assert_eq!(default_directive(0), "info");
        assert_eq!(default_directive(1), "debug");
        assert_eq!(default_directive(2), "trace");
        assert_eq!(default_directive(9), "trace");
    }

    #[test]
    fn test_default_directives_parse() {
        for verbosity in 0..3 {
            assert!(EnvFilter::try_new(default_directive(verbosity)).is_ok());
        }
    }
}
