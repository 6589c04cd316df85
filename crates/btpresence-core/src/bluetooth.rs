//! Bluetooth device discovery.
//!
//! A [`Scanner`] performs one discovery round at a time and reports every
//! device it saw as a [`Sighting`]. Two implementations exist:
//!
//! - `BluezScanner` (feature `bluetooth`, Linux): classic + LE discovery via
//!   BlueZ over D-Bus using `bluer`
//! - `MockScanner` (feature `mock-bluetooth`, or when `bluetooth` is off):
//!   replays scripted rounds, for tests and machines without a radio

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{PresenceError, Result};
use crate::types::{is_valid_mac_address, SightingEvent};

#[cfg(feature = "bluetooth")]
pub use bluez::BluezScanner;

#[cfg(any(test, feature = "mock-bluetooth", not(feature = "bluetooth")))]
pub use mock::{MockDevice, MockScanner, MOCK_SCRIPT_ENV};

/// Errors raised by scanners.
#[derive(Debug, Error)]
pub enum BluetoothError {
    /// No adapter (or not the requested one) is present.
    #[error("Bluetooth adapter not found")]
    AdapterNotFound,

    /// The adapter is present but powered off.
    #[error("Bluetooth adapter is powered off")]
    AdapterPoweredOff,

    /// The Bluetooth session could not be opened.
    #[error("Failed to open Bluetooth session: {message}")]
    SessionInitFailed {
        /// Underlying error.
        message: String,
    },

    /// A discovery round failed.
    #[error("Device discovery failed: {message}")]
    DiscoveryFailed {
        /// Underlying error.
        message: String,
    },

    /// A device reported an address that is not `XX:XX:XX:XX:XX:XX`.
    #[error("Invalid Bluetooth address: '{address}'")]
    InvalidAddress {
        /// The offending address.
        address: String,
    },

    /// A mock scan script could not be loaded.
    #[error("Invalid scan script: {message}")]
    ScriptError {
        /// What went wrong.
        message: String,
    },
}

/// Result type for scanner operations.
pub type BluetoothResult<T> = std::result::Result<T, BluetoothError>;

/// One device seen during a discovery round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sighting {
    /// Bluetooth address, `XX:XX:XX:XX:XX:XX`.
    pub address: String,
    /// Resolved name, if the device gave one.
    pub name: Option<String>,
    /// Signal strength in dBm, if known.
    pub rssi: Option<i16>,
    /// When the device was seen.
    pub seen_at: DateTime<Utc>,
}

impl Sighting {
    /// Convert into a tracker event, substituting `unknown_name` for a
    /// missing or blank name.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::InvalidDeviceId`] if the address is not a
    /// canonical Bluetooth address.
    pub fn into_event(self, unknown_name: &str) -> Result<SightingEvent> {
        if !is_valid_mac_address(&self.address) {
            return Err(PresenceError::from(BluetoothError::InvalidAddress {
                address: self.address,
            }));
        }
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| unknown_name.to_string());
        SightingEvent::new(self.address.to_uppercase(), name, self.seen_at)
    }
}

/// Source of discovery rounds.
// BlueZ discovery streams are not guaranteed to be `Send`.
#[async_trait(?Send)]
pub trait Scanner {
    /// Human-readable name of the radio or source, for logs.
    fn source(&self) -> &str;

    /// Run one discovery round and return every device seen in it.
    ///
    /// # Errors
    ///
    /// Returns [`BluetoothError::DiscoveryFailed`] if the round could not run.
    async fn discover(&mut self) -> BluetoothResult<Vec<Sighting>>;
}

#[async_trait(?Send)]
impl<S: Scanner + ?Sized> Scanner for Box<S> {
    fn source(&self) -> &str {
        (**self).source()
    }

    async fn discover(&mut self) -> BluetoothResult<Vec<Sighting>> {
        (**self).discover().await
    }
}

#[cfg(feature = "bluetooth")]
mod bluez {
    use std::collections::HashSet;
    use std::time::Duration;

    use async_trait::async_trait;
    use bluer::{Adapter, AdapterEvent, Address, ErrorKind, Session};
    use chrono::Utc;
    use futures::{pin_mut, StreamExt};
    use tracing::{debug, info, trace};

    use super::{BluetoothError, BluetoothResult, Scanner, Sighting};
    use crate::config::ScannerConfig;

    /// Scanner backed by a BlueZ adapter.
    pub struct BluezScanner {
        // Dropping the session tears down the D-Bus connection.
        _session: Session,
        adapter: Adapter,
        round: Duration,
    }

    impl std::fmt::Debug for BluezScanner {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("BluezScanner")
                .field("adapter", &self.adapter.name())
                .field("round", &self.round)
                .finish_non_exhaustive()
        }
    }

    impl BluezScanner {
        /// Open a BlueZ session and select the configured adapter.
        ///
        /// # Errors
        ///
        /// Returns an error if bluetoothd is unreachable, the adapter does not
        /// exist, or it is powered off.
        pub async fn new(config: &ScannerConfig) -> BluetoothResult<Self> {
            let session = Session::new()
                .await
                .map_err(|e| BluetoothError::SessionInitFailed {
                    message: e.to_string(),
                })?;

            let adapter = match &config.adapter {
                Some(name) => session.adapter(name).map_err(adapter_error)?,
                None => session.default_adapter().await.map_err(adapter_error)?,
            };

            if !adapter.is_powered().await.map_err(adapter_error)? {
                return Err(BluetoothError::AdapterPoweredOff);
            }

            info!(
                adapter = adapter.name(),
                round_secs = config.round_secs,
                "Bluetooth adapter ready"
            );

            Ok(Self {
                _session: session,
                adapter,
                round: config.round(),
            })
        }
    }

    #[async_trait(?Send)]
    impl Scanner for BluezScanner {
        fn source(&self) -> &str {
            self.adapter.name()
        }

        async fn discover(&mut self) -> BluetoothResult<Vec<Sighting>> {
            let events = self
                .adapter
                .discover_devices_with_changes()
                .await
                .map_err(discovery_error)?;
            pin_mut!(events);

            let deadline = tokio::time::Instant::now() + self.round;
            let mut seen: HashSet<Address> = HashSet::new();
            let mut sightings = Vec::new();

            while let Ok(Some(event)) = tokio::time::timeout_at(deadline, events.next()).await {
                let AdapterEvent::DeviceAdded(address) = event else {
                    continue;
                };
                if seen.contains(&address) {
                    continue;
                }

                let device = self.adapter.device(address).map_err(discovery_error)?;
                // Devices cached by BlueZ are replayed without a live RSSI.
                let rssi = device.rssi().await.unwrap_or(None);
                if rssi.is_none() {
                    trace!(%address, "Skipping cached device without RSSI");
                    continue;
                }
                let name = match device.name().await {
                    Ok(name) => name,
                    Err(e) => {
                        debug!(%address, error = %e, "Name lookup failed");
                        None
                    }
                };

                seen.insert(address);
                sightings.push(Sighting {
                    address: address.to_string(),
                    name,
                    rssi,
                    seen_at: Utc::now(),
                });
            }

            debug!(devices = sightings.len(), "Discovery round finished");
            Ok(sightings)
        }
    }

    fn adapter_error(err: bluer::Error) -> BluetoothError {
        match err.kind {
            ErrorKind::NotFound => BluetoothError::AdapterNotFound,
            _ => BluetoothError::SessionInitFailed {
                message: err.to_string(),
            },
        }
    }

    fn discovery_error(err: bluer::Error) -> BluetoothError {
        BluetoothError::DiscoveryFailed {
            message: err.to_string(),
        }
    }
}

#[cfg(any(test, feature = "mock-bluetooth", not(feature = "bluetooth")))]
mod mock {
    use std::collections::VecDeque;
    use std::path::Path;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use tracing::debug;

    use super::{BluetoothError, BluetoothResult, Scanner, Sighting};

    /// Environment variable naming a JSON scan script for [`MockScanner::from_env`].
    pub const MOCK_SCRIPT_ENV: &str = "BTPRESENCE_MOCK_SCRIPT";

    /// A scripted device in a mock discovery round.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct MockDevice {
        /// Bluetooth address.
        pub address: String,
        /// Name to report.
        #[serde(default)]
        pub name: Option<String>,
        /// Signal strength to report.
        #[serde(default)]
        pub rssi: Option<i16>,
        /// Fixed observation time. Stamped with the current time when unset.
        #[serde(default)]
        pub seen_at: Option<DateTime<Utc>>,
    }

    impl MockDevice {
        /// A device with a name, stamped when discovered.
        #[must_use]
        pub fn new(address: impl Into<String>, name: Option<&str>) -> Self {
            Self {
                address: address.into(),
                name: name.map(str::to_string),
                rssi: Some(-50),
                seen_at: None,
            }
        }

        /// Pin the observation time.
        #[must_use]
        pub fn at(mut self, seen_at: DateTime<Utc>) -> Self {
            self.seen_at = Some(seen_at);
            self
        }
    }

    enum Round {
        Devices(Vec<MockDevice>),
        Failure(String),
    }

    /// Scanner that replays scripted rounds, then reports empty rounds.
    #[derive(Default)]
    pub struct MockScanner {
        rounds: VecDeque<Round>,
        rounds_run: usize,
    }

    impl std::fmt::Debug for MockScanner {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MockScanner")
                .field("pending_rounds", &self.rounds.len())
                .field("rounds_run", &self.rounds_run)
                .finish()
        }
    }

    impl MockScanner {
        /// A scanner with no scripted rounds.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Append a round that discovers `devices`.
        #[must_use]
        pub fn round(mut self, devices: Vec<MockDevice>) -> Self {
            self.rounds.push_back(Round::Devices(devices));
            self
        }

        /// Append a round that fails with `message`.
        #[must_use]
        pub fn failing_round(mut self, message: impl Into<String>) -> Self {
            self.rounds.push_back(Round::Failure(message.into()));
            self
        }

        /// Load rounds from a JSON document: an array of rounds, each an array
        /// of `{"address", "name", "rssi", "seen_at"}` objects.
        ///
        /// # Errors
        ///
        /// Returns [`BluetoothError::ScriptError`] if the JSON is malformed.
        pub fn from_json(content: &str) -> BluetoothResult<Self> {
            let rounds: Vec<Vec<MockDevice>> =
                serde_json::from_str(content).map_err(|e| BluetoothError::ScriptError {
                    message: e.to_string(),
                })?;
            Ok(rounds.into_iter().fold(Self::new(), Self::round))
        }

        /// Load rounds from a JSON file. See [`MockScanner::from_json`].
        ///
        /// # Errors
        ///
        /// Returns [`BluetoothError::ScriptError`] if the file cannot be read
        /// or parsed.
        pub fn from_json_file(path: &Path) -> BluetoothResult<Self> {
            let content =
                std::fs::read_to_string(path).map_err(|e| BluetoothError::ScriptError {
                    message: format!("{}: {e}", path.display()),
                })?;
            Self::from_json(&content)
        }

        /// Load the script named by `BTPRESENCE_MOCK_SCRIPT`, or an empty
        /// scanner if the variable is unset.
        ///
        /// # Errors
        ///
        /// Returns [`BluetoothError::ScriptError`] if the script is unreadable.
        pub fn from_env() -> BluetoothResult<Self> {
            match std::env::var_os(MOCK_SCRIPT_ENV) {
                Some(path) => Self::from_json_file(Path::new(&path)),
                None => Ok(Self::new()),
            }
        }

        /// Number of rounds performed so far.
        #[must_use]
        pub const fn rounds_run(&self) -> usize {
            self.rounds_run
        }
    }

    #[async_trait(?Send)]
    impl Scanner for MockScanner {
        fn source(&self) -> &str {
            "mock"
        }

        async fn discover(&mut self) -> BluetoothResult<Vec<Sighting>> {
            self.rounds_run += 1;
            match self.rounds.pop_front() {
                Some(Round::Devices(devices)) => {
                    let now = Utc::now();
                    debug!(devices = devices.len(), "Replaying mock round");
                    Ok(devices
                        .into_iter()
                        .map(|d| Sighting {
                            address: d.address,
                            name: d.name,
                            rssi: d.rssi,
                            seen_at: d.seen_at.unwrap_or(now),
                        })
                        .collect())
                }
                Some(Round::Failure(message)) => Err(BluetoothError::DiscoveryFailed { message }),
                None => Ok(Vec::new()),
            }
        }
    }
}
