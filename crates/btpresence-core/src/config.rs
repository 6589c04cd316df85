//! Application configuration management.
//!
//! Configuration is layered, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. A TOML file (explicit path, or `config.toml` in the platform config dir)
//! 3. Environment variables prefixed with `BTPRESENCE_`, using `__` between
//!    section and key (e.g. `BTPRESENCE_TRACKER__GAP_THRESHOLD_SECS=120`)
//!
//! ```toml
//! [tracker]
//! gap_threshold_secs = 60
//! unknown_name = "[unknown]"
//!
//! [scanner]
//! adapter = "hci0"
//! round_secs = 10
//! pause_secs = 5
//!
//! [report]
//! timezone = "Europe/Berlin"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::tracker::{DEFAULT_GAP_THRESHOLD_SECS, UNKNOWN_NAME};

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "BTPRESENCE";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested configuration file does not exist.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Layered loading failed (unreadable file, bad TOML, bad env value).
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    /// A TOML document could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// The configuration could not be serialized to TOML.
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A single field holds an invalid value.
    #[error("Invalid value for '{field}': {message}")]
    ValidationError {
        /// Dotted field path, e.g. `tracker.gap_threshold_secs`.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields failed validation.
    #[error("Configuration has {} validation errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Presence tracking settings.
    pub tracker: TrackerConfig,
    /// Bluetooth discovery settings.
    pub scanner: ScannerConfig,
    /// Report rendering settings.
    pub report: ReportConfig,
}

/// `[tracker]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Longest silence, in seconds, that still counts as one presence session.
    pub gap_threshold_secs: u64,

    /// Name scanners report when a device's name cannot be resolved.
    pub unknown_name: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            gap_threshold_secs: DEFAULT_GAP_THRESHOLD_SECS,
            unknown_name: UNKNOWN_NAME.to_string(),
        }
    }
}

impl TrackerConfig {
    /// Gap threshold as a signed duration, saturating on absurd values.
    #[must_use]
    pub fn gap_threshold(&self) -> chrono::Duration {
        let secs = i64::try_from(self.gap_threshold_secs).unwrap_or(i64::MAX / 1_000);
        chrono::Duration::try_seconds(secs).unwrap_or(chrono::Duration::MAX)
    }
}

/// Upper bound for `scanner.round_secs` and `scanner.pause_secs`.
pub const MAX_SCANNER_SECS: u64 = 3600;

/// `[scanner]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Adapter to scan with (e.g. `hci0`). The system default when unset.
    pub adapter: Option<String>,

    /// Length of one discovery round in seconds.
    pub round_secs: u64,

    /// Pause between discovery rounds in seconds.
    pub pause_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            adapter: None,
            round_secs: 10,
            pause_secs: 5,
        }
    }
}

impl ScannerConfig {
    /// Discovery round length.
    #[must_use]
    pub const fn round(&self) -> StdDuration {
        StdDuration::from_secs(self.round_secs)
    }

    /// Pause between rounds.
    #[must_use]
    pub const fn pause(&self) -> StdDuration {
        StdDuration::from_secs(self.pause_secs)
    }
}

/// `[report]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Timezone used to display instants in the report.
    #[serde(with = "timezone_serde")]
    pub timezone: Tz,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::UTC,
        }
    }
}

impl Config {
    /// Load layered configuration.
    ///
    /// With `path = Some(..)` the file must exist. Without it, the default
    /// location from [`Config::default_path`] is used if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing (explicit path only), cannot
    /// be parsed, an environment override has the wrong type, or the result
    /// fails [`Config::validate`].
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.display().to_string()));
                }
                debug!(path = %path.display(), "Loading configuration file");
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(default_path) = Self::default_path().filter(|p| p.exists()) {
                    debug!(path = %default_path.display(), "Loading configuration file");
                    builder = builder.add_source(config::File::from(default_path).required(false));
                }
            }
        }

        let config: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document, filling unspecified fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or fails validation.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Platform config file location, e.g. `~/.config/btpresence/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "btpresence")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Check every field, reporting all problems at once.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for a single problem or
    /// [`ConfigError::MultipleValidationErrors`] for several.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if self.tracker.gap_threshold_secs == 0 {
            errors.push(ConfigError::ValidationError {
                field: "tracker.gap_threshold_secs".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.tracker.unknown_name.trim().is_empty() {
            errors.push(ConfigError::ValidationError {
                field: "tracker.unknown_name".into(),
                message: "must not be empty".into(),
            });
        }
        if self.scanner.round_secs == 0 {
            errors.push(ConfigError::ValidationError {
                field: "scanner.round_secs".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.scanner.round_secs > MAX_SCANNER_SECS {
            errors.push(ConfigError::ValidationError {
                field: "scanner.round_secs".into(),
                message: format!("must be at most {MAX_SCANNER_SECS}"),
            });
        }
        if self.scanner.pause_secs > MAX_SCANNER_SECS {
            errors.push(ConfigError::ValidationError {
                field: "scanner.pause_secs".into(),
                message: format!("must be at most {MAX_SCANNER_SECS}"),
            });
        }
        if let Some(adapter) = &self.scanner.adapter {
            if adapter.trim().is_empty() {
                errors.push(ConfigError::ValidationError {
                    field: "scanner.adapter".into(),
                    message: "must not be empty when set".into(),
                });
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }
}

mod timezone_serde {
    use chrono_tz::Tz;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(tz: &Tz, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(tz.name())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Tz, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
