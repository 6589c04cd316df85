//! Unified error types for the btpresence core library.
//!
//! This module provides a unified error type [`PresenceError`] that covers all
//! failure modes across the system. Each module also has its own specific
//! error type (`ConfigError`, `BluetoothError`, `ServiceError`, `ReportError`)
//! which converts into it.
//!
//! The presence tracker itself is infallible: malformed events are rejected
//! when a [`crate::SightingEvent`] is built, and clock anomalies are resolved
//! by clamping.
//!
//! # Example
//!
//! ```rust
//! use btpresence_core::error::{PresenceError, Result};
//! use std::path::PathBuf;
//!
//! fn load_config(path: &PathBuf) -> Result<()> {
//!     if !path.exists() {
//!         return Err(PresenceError::ConfigNotFound(path.clone()));
//!     }
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// The unified error type for all btpresence operations.
#[derive(Debug, Error)]
pub enum PresenceError {
    // =========================================================================
    // BLUETOOTH ERRORS
    // =========================================================================
    /// No Bluetooth adapter was found on this system.
    #[error(
        "No Bluetooth adapter found. Ensure Bluetooth hardware is present and drivers are loaded."
    )]
    BluetoothAdapterNotFound,

    /// The Bluetooth adapter exists but is powered off.
    #[error("Bluetooth adapter is powered off. Run 'bluetoothctl power on' to enable.")]
    BluetoothAdapterPoweredOff,

    /// Opening the Bluetooth session failed.
    #[error("Failed to initialize Bluetooth: {0}")]
    BluetoothInitFailed(String),

    /// A discovery round failed.
    #[error("Bluetooth scan failed: {0}")]
    BluetoothScanFailed(String),

    // =========================================================================
    // SIGHTING ERRORS
    // =========================================================================
    /// A sighting event carried an empty or unusable device identifier.
    #[error("Invalid device identifier: '{0}'")]
    InvalidDeviceId(String),

    /// The tracker task is no longer running.
    #[error("Presence tracker is not running")]
    TrackerUnavailable,

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration file exists but could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // REPORT & I/O ERRORS
    // =========================================================================
    /// The report could not be rendered or written.
    #[error("Report error: {0}")]
    ReportError(String),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for btpresence operations.
pub type Result<T> = std::result::Result<T, PresenceError>;

impl PresenceError {
    /// Returns `true` if this error is related to Bluetooth operations.
    #[inline]
    #[must_use]
    pub const fn is_bluetooth_error(&self) -> bool {
        matches!(
            self,
            Self::BluetoothAdapterNotFound
                | Self::BluetoothAdapterPoweredOff
                | Self::BluetoothInitFailed(_)
                | Self::BluetoothScanFailed(_)
        )
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_) | Self::ConfigParseError(_) | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if this error is related to I/O or report output.
    #[inline]
    #[must_use]
    pub const fn is_io_error(&self) -> bool {
        matches!(self, Self::ReportError(_) | Self::IoError(_))
    }

    /// Returns `true` if the observation run can continue after this error.
    ///
    /// A single failed discovery round or a rejected sighting does not end the
    /// run; adapter and session failures do.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::BluetoothScanFailed(_) | Self::InvalidDeviceId(_))
    }

    /// Returns a machine-readable error code.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::BluetoothAdapterNotFound => "BLUETOOTH_ADAPTER_NOT_FOUND",
            Self::BluetoothAdapterPoweredOff => "BLUETOOTH_ADAPTER_POWERED_OFF",
            Self::BluetoothInitFailed(_) => "BLUETOOTH_INIT_FAILED",
            Self::BluetoothScanFailed(_) => "BLUETOOTH_SCAN_FAILED",
            Self::InvalidDeviceId(_) => "INVALID_DEVICE_ID",
            Self::TrackerUnavailable => "TRACKER_UNAVAILABLE",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::ReportError(_) => "REPORT_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::config::ConfigError> for PresenceError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::NotFound(path) => Self::ConfigNotFound(path.into()),
            ConfigError::LoadError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::ParseError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::SerializeError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::ValidationError { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

impl From<crate::bluetooth::BluetoothError> for PresenceError {
    fn from(err: crate::bluetooth::BluetoothError) -> Self {
        use crate::bluetooth::BluetoothError;
        match err {
            BluetoothError::AdapterNotFound => Self::BluetoothAdapterNotFound,
            BluetoothError::AdapterPoweredOff => Self::BluetoothAdapterPoweredOff,
            BluetoothError::SessionInitFailed { message } => Self::BluetoothInitFailed(message),
            BluetoothError::DiscoveryFailed { message } => Self::BluetoothScanFailed(message),
            BluetoothError::InvalidAddress { address } => Self::InvalidDeviceId(address),
            BluetoothError::ScriptError { message } => Self::BluetoothInitFailed(message),
        }
    }
}

impl From<crate::service::ServiceError> for PresenceError {
    fn from(err: crate::service::ServiceError) -> Self {
        match err {
            crate::service::ServiceError::Closed => Self::TrackerUnavailable,
        }
    }
}

impl From<crate::report::ReportError> for PresenceError {
    fn from(err: crate::report::ReportError) -> Self {
        use crate::report::ReportError;
        match err {
            ReportError::Io(e) => Self::IoError(e),
            other => Self::ReportError(other.to_string()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoErr, ErrorKind};

    #[test]
    fn test_bluetooth_error_classification() {
        assert!(PresenceError::BluetoothAdapterNotFound.is_bluetooth_error());
        assert!(PresenceError::BluetoothAdapterPoweredOff.is_bluetooth_error());
        assert!(PresenceError::BluetoothInitFailed("dbus".into()).is_bluetooth_error());
        assert!(PresenceError::BluetoothScanFailed("test".into()).is_bluetooth_error());

        assert!(!PresenceError::TrackerUnavailable.is_bluetooth_error());
    }

    #[test]
    fn test_config_error_classification() {
        assert!(PresenceError::ConfigNotFound(PathBuf::from("/test")).is_config_error());
        assert!(PresenceError::ConfigParseError("syntax error".into()).is_config_error());
        assert!(PresenceError::ConfigValidationError("invalid value".into()).is_config_error());

        assert!(!PresenceError::BluetoothAdapterNotFound.is_config_error());
    }

    #[test]
    fn test_io_error_classification() {
        assert!(PresenceError::ReportError("disk full".into()).is_io_error());
        assert!(PresenceError::IoError(IoErr::new(ErrorKind::NotFound, "test")).is_io_error());

        assert!(!PresenceError::BluetoothAdapterNotFound.is_io_error());
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(PresenceError::BluetoothScanFailed("timeout".into()).is_recoverable());
        assert!(PresenceError::InvalidDeviceId(String::new()).is_recoverable());
        assert!(!PresenceError::BluetoothAdapterNotFound.is_recoverable());
        assert!(!PresenceError::BluetoothInitFailed("dbus".into()).is_recoverable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            PresenceError::BluetoothAdapterNotFound.error_code(),
            "BLUETOOTH_ADAPTER_NOT_FOUND"
        );
        assert_eq!(
            PresenceError::TrackerUnavailable.error_code(),
            "TRACKER_UNAVAILABLE"
        );
        assert_eq!(
            PresenceError::ConfigNotFound(PathBuf::new()).error_code(),
            "CONFIG_NOT_FOUND"
        );
    }

    #[test]
    fn test_from_config_validation_errors() {
        use crate::config::ConfigError;

        let err: PresenceError = ConfigError::MultipleValidationErrors(vec![
            ConfigError::ValidationError {
                field: "tracker.gap_threshold_secs".into(),
                message: "must be greater than zero".into(),
            },
            ConfigError::ValidationError {
                field: "scanner.round_secs".into(),
                message: "must be greater than zero".into(),
            },
        ])
        .into();

        assert!(err.is_config_error());
        let message = err.to_string();
        assert!(message.contains("tracker.gap_threshold_secs"));
        assert!(message.contains("scanner.round_secs"));
    }

    #[test]
    fn test_from_bluetooth_error() {
        use crate::bluetooth::BluetoothError;

        let err: PresenceError = BluetoothError::AdapterPoweredOff.into();
        assert!(matches!(err, PresenceError::BluetoothAdapterPoweredOff));

        let err: PresenceError = BluetoothError::DiscoveryFailed {
            message: "busy".into(),
        }
        .into();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoErr::new(ErrorKind::NotFound, "file not found");
        let err: PresenceError = io_err.into();
        assert!(matches!(err, PresenceError::IoError(_)));
        assert!(err.is_io_error());
    }

    #[test]
    fn test_from_report_error() {
        let err = PresenceError::from(crate::report::ReportError::Pdf("no fonts".into()));
        assert!(matches!(err, PresenceError::ReportError(_)));
        assert_eq!(err.error_code(), "REPORT_ERROR");
        assert!(err.to_string().contains("no fonts"));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err = PresenceError::from(crate::report::ReportError::Io(io));
        assert!(matches!(err, PresenceError::IoError(_)));
    }

    #[test]
    fn test_error_display_messages() {
        let err = PresenceError::BluetoothAdapterNotFound;
        assert!(format!("{err}").contains("No Bluetooth adapter found"));

        let err = PresenceError::InvalidDeviceId(String::new());
        assert!(format!("{err}").contains("Invalid device identifier"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<PresenceError>();
        assert_sync::<PresenceError>();
    }
}
