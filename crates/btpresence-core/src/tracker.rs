//! Presence interval tracking.
//!
//! [`PresenceTracker`] folds a stream of [`SightingEvent`]s into a minimal set
//! of disjoint presence intervals per device:
//!
//! - sightings no more than the gap threshold apart extend the current session
//! - a longer silence starts a new session
//! - a sighting that arrives "in the past" (clock stepped back, late batch) is
//!   clamped to the end of the current session, so no interval ever shrinks
//!
//! The tracker is a plain, synchronous data structure. Ownership across tasks
//! is handled by [`crate::service`].

use std::collections::HashMap;

use chrono::Duration;
use tracing::{debug, trace, warn};

use crate::config::TrackerConfig;
use crate::types::{DeviceRecord, PresenceInterval, SightingEvent};

/// Default maximum silence between sightings of one session.
pub const DEFAULT_GAP_THRESHOLD_SECS: u64 = 60;

/// Name reported by scanners that could not resolve a device's name.
pub const UNKNOWN_NAME: &str = "[unknown]";

/// Folds sighting events into per-device presence intervals.
///
/// Records are kept in first-seen order, which is also the order of
/// [`PresenceTracker::export`].
#[derive(Debug, Clone)]
pub struct PresenceTracker {
    gap_threshold: Duration,
    unknown_name: String,
    records: Vec<DeviceRecord>,
    index: HashMap<String, usize>,
}

impl PresenceTracker {
    /// Create an empty tracker with the given gap threshold.
    #[must_use]
    pub fn new(gap_threshold: Duration) -> Self {
        Self {
            gap_threshold,
            unknown_name: UNKNOWN_NAME.to_string(),
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Create an empty tracker from the `[tracker]` configuration section.
    #[must_use]
    pub fn with_config(config: &TrackerConfig) -> Self {
        let mut tracker = Self::new(config.gap_threshold());
        tracker.unknown_name.clone_from(&config.unknown_name);
        tracker
    }

    /// The configured gap threshold.
    #[must_use]
    pub const fn gap_threshold(&self) -> Duration {
        self.gap_threshold
    }

    /// Number of distinct devices seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` if no device has been seen yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fold one sighting into the device's record.
    pub fn record(&mut self, event: &SightingEvent) {
        let observed_at = event.observed_at();

        let Some(&slot) = self.index.get(event.device_id()) else {
            debug!(
                device_id = event.device_id(),
                name = event.display_name(),
                %observed_at,
                "New device"
            );
            self.index
                .insert(event.device_id().to_string(), self.records.len());
            self.records.push(DeviceRecord {
                device_id: event.device_id().to_string(),
                display_name: event.display_name().to_string(),
                intervals: vec![PresenceInterval::instant(observed_at)],
                sightings: 1,
            });
            return;
        };

        let gap_threshold = self.gap_threshold;
        let is_placeholder = |name: &str| is_placeholder_name(name, &self.unknown_name);
        let adopt_name =
            is_placeholder(&self.records[slot].display_name) && !is_placeholder(event.display_name());

        let record = &mut self.records[slot];
        record.sightings += 1;
        if adopt_name {
            debug!(
                device_id = %record.device_id,
                old = %record.display_name,
                new = event.display_name(),
                "Resolved device name"
            );
            record.display_name = event.display_name().to_string();
        }

        // Records are created with one interval and never lose one.
        let Some(last) = record.intervals.last_mut() else {
            record.intervals.push(PresenceInterval::instant(observed_at));
            return;
        };

        let effective = if observed_at < last.end {
            warn!(
                device_id = %record.device_id,
                %observed_at,
                session_end = %last.end,
                "Sighting earlier than current session end; clamping"
            );
            last.end
        } else {
            observed_at
        };

        if effective - last.end <= gap_threshold {
            trace!(device_id = %record.device_id, until = %effective, "Extending session");
            last.end = effective;
        } else {
            debug!(
                device_id = %record.device_id,
                gap_secs = (effective - last.end).num_seconds(),
                "Gap exceeded threshold; starting new session"
            );
            record
                .intervals
                .push(PresenceInterval::instant(observed_at));
        }
    }

    /// Fold a batch of sightings, in order.
    pub fn record_all<'a, I>(&mut self, events: I)
    where
        I: IntoIterator<Item = &'a SightingEvent>,
    {
        for event in events {
            self.record(event);
        }
    }

    /// Snapshot of every device record, in first-seen order.
    ///
    /// The returned records are owned copies; later calls to
    /// [`PresenceTracker::record`] do not affect them.
    #[must_use]
    pub fn export(&self) -> Vec<DeviceRecord> {
        self.records.clone()
    }

    /// Discard all device records. The configuration is kept.
    pub fn reset(&mut self) {
        self.records.clear();
        self.index.clear();
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::with_config(&TrackerConfig::default())
    }
}

/// A name carries no information if it is blank or the unknown marker.
fn is_placeholder_name(name: &str, unknown_name: &str) -> bool {
    let name = name.trim();
    name.is_empty() || name == unknown_name
}
