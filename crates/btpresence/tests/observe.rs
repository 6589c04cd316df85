//! Tests for the observation loop
//!
//! Time is paused, so windows of minutes run instantly and round counts are
//! exact.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use btpresence::driver::{observe, ObservationWindow};
use btpresence_core::{
    BluetoothError, BluetoothResult, PresenceError, PresenceTracker, Scanner, Sighting,
    TrackerHandle,
};
use chrono::{DateTime, TimeZone, Utc};
use tokio_test::{assert_err, assert_ok};

mod helpers {
    use super::*;

    pub fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    pub fn sighting(address: &str, name: Option<&str>, secs: i64) -> Sighting {
        Sighting {
            address: address.to_string(),
            name: name.map(str::to_string),
            rssi: Some(-55),
            seen_at: at(secs),
        }
    }

    pub fn tracker() -> TrackerHandle {
        TrackerHandle::spawn(PresenceTracker::new(chrono::Duration::seconds(60)), 8)
    }

    pub fn window(duration_secs: u64, pause_secs: u64) -> ObservationWindow {
        ObservationWindow {
            duration: Duration::from_secs(duration_secs),
            pause: Duration::from_secs(pause_secs),
        }
    }
}

use helpers::{sighting, tracker, window};

/// Replays scripted rounds; `None` entries fail.
#[derive(Default)]
struct ScriptedScanner {
    rounds: VecDeque<Option<Vec<Sighting>>>,
    calls: usize,
}

impl ScriptedScanner {
    fn new(rounds: Vec<Option<Vec<Sighting>>>) -> Self {
        Self {
            rounds: rounds.into(),
            calls: 0,
        }
    }
}

#[async_trait(?Send)]
impl Scanner for ScriptedScanner {
    fn source(&self) -> &str {
        "scripted"
    }

    async fn discover(&mut self) -> BluetoothResult<Vec<Sighting>> {
        self.calls += 1;
        match self.rounds.pop_front() {
            Some(Some(sightings)) => Ok(sightings),
            Some(None) => Err(BluetoothError::DiscoveryFailed {
                message: "adapter busy".into(),
            }),
            None => Ok(Vec::new()),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_rounds_fill_the_window() {
    let mut scanner = ScriptedScanner::default();
    let handle = tracker();

    let summary = assert_ok!(
        observe(
            &mut scanner,
            &handle,
            window(30, 5),
            "[unknown]",
            std::future::pending()
        )
        .await
    );

    // Rounds start at 0, 5, 10, 15, 20 and 25 seconds.
    assert_eq!(summary.rounds, 6);
    assert_eq!(scanner.calls, 6);
    assert!(!summary.interrupted);
    assert!(handle.export().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sightings_become_presence_intervals() {
    let mut scanner = ScriptedScanner::new(vec![
        Some(vec![
            sighting("AA:BB:CC:DD:EE:01", Some("Phone"), 0),
            sighting("AA:BB:CC:DD:EE:02", None, 0),
        ]),
        Some(vec![
            sighting("AA:BB:CC:DD:EE:01", Some("Phone"), 30),
            sighting("AA:BB:CC:DD:EE:02", Some("Watch"), 10),
        ]),
        None,
        Some(vec![sighting("AA:BB:CC:DD:EE:01", Some("Phone"), 100)]),
    ]);
    let handle = tracker();

    let summary = observe(
        &mut scanner,
        &handle,
        window(60, 5),
        "[unknown]",
        std::future::pending(),
    )
    .await
    .unwrap();

    assert_eq!(summary.failed_rounds, 1);
    assert_eq!(summary.sightings, 5);
    assert_eq!(summary.rejected, 0);

    let devices = handle.export().await.unwrap();
    assert_eq!(devices.len(), 2);

    let phone = &devices[0];
    assert_eq!(phone.device_id, "AA:BB:CC:DD:EE:01");
    assert_eq!(phone.intervals.len(), 2);
    assert_eq!(phone.intervals[0].start, helpers::at(0));
    assert_eq!(phone.intervals[0].end, helpers::at(30));
    assert!(phone.intervals[1].is_degenerate());

    let watch = &devices[1];
    assert_eq!(watch.display_name, "Watch");
    assert_eq!(watch.intervals.len(), 1);
    assert_eq!(watch.intervals[0].end, helpers::at(10));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_addresses_are_dropped() {
    let mut scanner = ScriptedScanner::new(vec![Some(vec![
        sighting("", Some("Ghost"), 0),
        sighting("not-a-mac", Some("Ghost"), 0),
        sighting("aa:bb:cc:dd:ee:03", Some("Earbuds"), 0),
    ])]);
    let handle = tracker();

    let summary = observe(
        &mut scanner,
        &handle,
        window(10, 5),
        "[unknown]",
        std::future::pending(),
    )
    .await
    .unwrap();

    assert_eq!(summary.rejected, 2);
    assert_eq!(summary.sightings, 1);

    let devices = handle.export().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].device_id, "AA:BB:CC:DD:EE:03");
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_ends_the_window_early() {
    let mut scanner = ScriptedScanner::default();
    let handle = tracker();

    let summary = observe(
        &mut scanner,
        &handle,
        window(3600, 5),
        "[unknown]",
        tokio::time::sleep(Duration::from_secs(12)),
    )
    .await
    .unwrap();

    // Rounds at 0, 5 and 10 seconds; the pause after the third is cut short.
    assert!(summary.interrupted);
    assert_eq!(summary.rounds, 3);
}

#[tokio::test(start_paused = true)]
async fn test_immediate_shutdown_runs_no_rounds() {
    let mut scanner = ScriptedScanner::default();
    let handle = tracker();

    let summary = observe(&mut scanner, &handle, window(60, 5), "[unknown]", async {})
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.rounds, 0);
    assert_eq!(scanner.calls, 0);
}

#[tokio::test(start_paused = true)]
async fn test_stopped_tracker_is_fatal() {
    let mut scanner = ScriptedScanner::new(vec![Some(vec![sighting(
        "AA:BB:CC:DD:EE:01",
        Some("Phone"),
        0,
    )])]);
    let handle = tracker();
    handle.clone().shutdown().await.unwrap();

    let err = assert_err!(
        observe(
            &mut scanner,
            &handle,
            window(30, 5),
            "[unknown]",
            std::future::pending()
        )
        .await
    );
    assert!(matches!(err, PresenceError::TrackerUnavailable));
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_window_runs_until_shutdown() {
    let mut scanner = ScriptedScanner::default();
    let handle = tracker();
    let endless = ObservationWindow {
        duration: Duration::from_secs(u64::MAX),
        pause: Duration::from_secs(5),
    };

    let summary = assert_ok!(
        observe(
            &mut scanner,
            &handle,
            endless,
            "[unknown]",
            tokio::time::sleep(Duration::from_secs(12))
        )
        .await
    );

    assert!(summary.interrupted);
    assert_eq!(summary.rounds, 3);
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_pause_is_cut_at_the_window_end() {
    let mut scanner = ScriptedScanner::default();
    let handle = tracker();
    let window = ObservationWindow {
        duration: Duration::from_secs(30),
        pause: Duration::MAX,
    };

    let summary = observe(
        &mut scanner,
        &handle,
        window,
        "[unknown]",
        std::future::pending(),
    )
    .await
    .unwrap();

    assert!(!summary.interrupted);
    assert_eq!(summary.rounds, 1);
}
