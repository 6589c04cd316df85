//! Shared data model: sighting events, presence intervals and device records.
//!
//! These are the types that flow through the pipeline:
//! scanner → [`SightingEvent`] → tracker → [`DeviceRecord`] → report.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{PresenceError, Result};

/// Canonical Bluetooth address: six colon-separated hex octets.
static MAC_ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{2}(:[0-9A-Fa-f]{2}){5}$").expect("MAC address regex is valid")
});

/// Returns `true` if `address` looks like `AA:BB:CC:DD:EE:FF`.
#[must_use]
pub fn is_valid_mac_address(address: &str) -> bool {
    MAC_ADDRESS_RE.is_match(address)
}

/// A single observation of a device at an instant.
///
/// Construct with [`SightingEvent::new`], which rejects events that carry no
/// usable device identity. The tracker assumes every event it receives has
/// passed through this boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SightingEvent {
    device_id: String,
    display_name: String,
    observed_at: DateTime<Utc>,
}

impl SightingEvent {
    /// Create a validated sighting event.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::InvalidDeviceId`] if `device_id` is empty or
    /// only whitespace.
    pub fn new(
        device_id: impl Into<String>,
        display_name: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Result<Self> {
        let device_id = device_id.into();
        if device_id.trim().is_empty() {
            return Err(PresenceError::InvalidDeviceId(device_id));
        }
        Ok(Self {
            device_id,
            display_name: display_name.into(),
            observed_at,
        })
    }

    /// Opaque, stable device identifier (a Bluetooth address for real scans).
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Name reported alongside this sighting. May be empty or a placeholder.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// When the device was observed.
    #[must_use]
    pub const fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }
}

/// A closed span `[start, end]` during which a device was continuously present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceInterval {
    /// First sighting of the session.
    pub start: DateTime<Utc>,
    /// Latest sighting folded into the session. Never before `start`.
    pub end: DateTime<Utc>,
}

impl PresenceInterval {
    /// A zero-length interval at `at`.
    #[must_use]
    pub const fn instant(at: DateTime<Utc>) -> Self {
        Self { start: at, end: at }
    }

    /// Length of the interval.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// `true` when `start == end`, i.e. the device was seen exactly once.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.start == self.end
    }
}

/// Everything known about one device after (or during) an observation run.
///
/// `intervals` is never empty, ordered by `start`, and consecutive intervals
/// are separated by a strictly positive gap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Opaque device identifier.
    pub device_id: String,
    /// Best known name for the device.
    pub display_name: String,
    /// Disjoint presence sessions in chronological order.
    pub intervals: Vec<PresenceInterval>,
    /// Number of sightings folded into this record.
    pub sightings: u64,
}

impl DeviceRecord {
    /// Start of the first presence session.
    #[must_use]
    pub fn first_seen(&self) -> Option<DateTime<Utc>> {
        self.intervals.first().map(|i| i.start)
    }

    /// End of the latest presence session.
    #[must_use]
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.intervals.last().map(|i| i.end)
    }

    /// Sum of all session lengths.
    #[must_use]
    pub fn total_presence(&self) -> Duration {
        self.intervals
            .iter()
            .fold(Duration::zero(), |acc, i| acc + i.duration())
    }
}
