//! Command-line interface.

use std::path::PathBuf;
use std::time::Duration;

use btpresence_core::{Config, ReportFormat};
use clap::Parser;

/// Scan for nearby Bluetooth devices and report when each one was present.
#[derive(Debug, Clone, Parser)]
#[command(name = "btpresence", version, about, long_about = None)]
pub struct Cli {
    /// How long to scan: seconds, or a number suffixed with s, m or h (e.g. 90, 5m, 3h).
    #[arg(value_parser = parse_duration)]
    pub duration: Duration,

    /// Where to write the report. A `.json` extension selects JSON output and
    /// `.pdf` a PDF document.
    pub output: PathBuf,

    /// Configuration file (defaults to the platform config directory).
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Longest silence, in seconds, still counted as one presence session.
    #[arg(long, value_name = "SECS")]
    pub gap: Option<u64>,

    /// Bluetooth adapter to scan with (e.g. hci0).
    #[arg(long, value_name = "NAME")]
    pub adapter: Option<String>,

    /// Report format, overriding the output file extension.
    #[arg(long, value_name = "text|json|pdf")]
    pub format: Option<ReportFormat>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(gap) = self.gap {
            config.tracker.gap_threshold_secs = gap;
        }
        if let Some(adapter) = &self.adapter {
            config.scanner.adapter = Some(adapter.clone());
        }
    }

    /// Explicit `--format`, else inferred from the output path.
    #[must_use]
    pub fn report_format(&self) -> ReportFormat {
        self.format
            .unwrap_or_else(|| ReportFormat::from_path(&self.output))
    }
}

/// Longest accepted observation window: 30 days.
pub const MAX_DURATION: Duration = Duration::from_secs(30 * 86_400);

/// Parse `90`, `90s`, `5m` or `3h` into a duration.
///
/// # Errors
///
/// Returns a message if the number is missing or malformed, the unit is not
/// one of `s`, `m`, `h`, the value is zero, or it exceeds [`MAX_DURATION`].
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let (digits, multiplier) = match input.chars().last() {
        Some('s' | 'S') => (&input[..input.len() - 1], 1),
        Some('m' | 'M') => (&input[..input.len() - 1], 60),
        Some('h' | 'H') => (&input[..input.len() - 1], 3600),
        Some(c) if c.is_ascii_digit() => (input, 1),
        Some(c) => return Err(format!("unknown duration unit '{c}' (expected s, m or h)")),
        None => return Err("duration is empty".to_string()),
    };

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration '{input}'"))?;
    if value == 0 {
        return Err("duration must be greater than zero".to_string());
    }
    let secs = value
        .checked_mul(multiplier)
        .filter(|&secs| secs <= MAX_DURATION.as_secs())
        .ok_or_else(|| {
            format!(
                "duration '{input}' is too large (at most {}h)",
                MAX_DURATION.as_secs() / 3600
            )
        })?;
    Ok(Duration::from_secs(secs))
}
