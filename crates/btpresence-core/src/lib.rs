//! # btpresence-core
//!
//! Core logic for btpresence: Bluetooth presence interval tracking.
//!
//! This crate provides:
//! - A presence tracker that folds device sightings into disjoint intervals
//! - A single-writer tokio task that owns the tracker
//! - Bluetooth discovery (BlueZ, or a scripted mock)
//! - Configuration loading and validation
//! - Report rendering
//!
//! ## Architecture
//!
//! ```text
//! Scanner ──Sighting──► SightingEvent ──► TrackerHandle ──► PresenceTracker
//!                                                │ export
//!                                                ▼
//!                                     Vec<DeviceRecord> ──► Report
//! ```
//!
//! - [`tracker`] - Interval merging, the heart of the crate
//! - [`service`] - Task ownership of the tracker with queue-ordered access
//! - [`bluetooth`] - Discovery rounds producing sightings
//! - [`config`] - Layered configuration (defaults, TOML, environment)
//! - [`report`] - Text and JSON report rendering
//! - [`error`] - Unified error types for the crate
//! - [`types`] - Sighting events, intervals and device records

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod bluetooth;
pub mod config;
pub mod error;
pub mod report;
pub mod service;
pub mod tracker;
pub mod types;

// Re-export primary types for convenience
#[cfg(feature = "bluetooth")]
pub use bluetooth::BluezScanner;
#[cfg(any(test, feature = "mock-bluetooth", not(feature = "bluetooth")))]
pub use bluetooth::{MockDevice, MockScanner};
pub use bluetooth::{BluetoothError, BluetoothResult, Scanner, Sighting};
pub use config::{
    Config, ConfigError, ConfigResult, ReportConfig, ScannerConfig, TrackerConfig,
};
pub use error::{PresenceError, Result};
pub use report::{render_pdf, write_report, Report, ReportError, ReportFormat};
pub use service::{ServiceError, TrackerHandle, DEFAULT_QUEUE_CAPACITY};
pub use tracker::{PresenceTracker, DEFAULT_GAP_THRESHOLD_SECS, UNKNOWN_NAME};
pub use types::{is_valid_mac_address, DeviceRecord, PresenceInterval, SightingEvent};
