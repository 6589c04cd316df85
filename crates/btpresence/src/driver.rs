//! The observation loop: run discovery rounds until the window closes, feeding
//! every sighting to the tracker.

use std::future::Future;
use std::time::Duration;

use btpresence_core::{PresenceError, Scanner, SightingEvent, TrackerHandle};
use chrono::{DateTime, Utc};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Stand-in deadline for waits too long to represent as an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Timing of one observation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationWindow {
    /// Total scanning time.
    pub duration: Duration,
    /// Pause between discovery rounds.
    pub pause: Duration,
}

/// What happened during an observation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationSummary {
    /// Wall-clock start.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end.
    pub finished_at: DateTime<Utc>,
    /// Discovery rounds attempted.
    pub rounds: usize,
    /// Rounds that failed and were skipped.
    pub failed_rounds: usize,
    /// Sightings accepted by the tracker.
    pub sightings: usize,
    /// Sightings dropped for carrying an invalid address.
    pub rejected: usize,
    /// `true` if `shutdown` fired before the window closed.
    pub interrupted: bool,
}

/// Run discovery rounds for `window.duration`, or until `shutdown` resolves.
///
/// A round in progress is allowed to finish when the window closes. A failed
/// round is logged and skipped.
///
/// # Errors
///
/// Returns [`PresenceError::TrackerUnavailable`] if the tracker task stops.
pub async fn observe<S, F>(
    scanner: &mut S,
    tracker: &TrackerHandle,
    window: ObservationWindow,
    unknown_name: &str,
    shutdown: F,
) -> Result<ObservationSummary, PresenceError>
where
    S: Scanner + ?Sized,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let deadline = deadline_after(Instant::now(), window.duration);
    let mut summary = ObservationSummary {
        started_at: Utc::now(),
        finished_at: Utc::now(),
        rounds: 0,
        failed_rounds: 0,
        sightings: 0,
        rejected: 0,
        interrupted: false,
    };

    info!(
        source = scanner.source(),
        duration_secs = window.duration.as_secs(),
        "Scanning started"
    );

    while Instant::now() < deadline {
        let result = tokio::select! {
            biased;
            () = &mut shutdown => {
                summary.interrupted = true;
                break;
            }
            result = scanner.discover() => result,
        };
        summary.rounds += 1;

        match result {
            Ok(sightings) => {
                let mut events: Vec<SightingEvent> = Vec::with_capacity(sightings.len());
                for sighting in sightings {
                    info!(
                        name = sighting.name.as_deref().unwrap_or(unknown_name),
                        address = %sighting.address,
                        rssi = ?sighting.rssi,
                        at = %sighting.seen_at,
                        "Found device"
                    );
                    match sighting.into_event(unknown_name) {
                        Ok(event) => events.push(event),
                        Err(e) => {
                            summary.rejected += 1;
                            warn!(error = %e, "Dropping sighting");
                        }
                    }
                }
                summary.sightings += events.len();
                tracker.record_batch(events).await?;
            }
            Err(e) => {
                summary.failed_rounds += 1;
                warn!(round = summary.rounds, error = %e, "Discovery round failed");
            }
        }

        let resume_at = deadline_after(Instant::now(), window.pause).min(deadline);
        debug!(pause_ms = window.pause.as_millis(), "Waiting for next round");
        tokio::select! {
            biased;
            () = &mut shutdown => {
                summary.interrupted = true;
                break;
            }
            () = sleep_until(resume_at) => {}
        }
    }

    summary.finished_at = Utc::now();
    info!(
        rounds = summary.rounds,
        failed_rounds = summary.failed_rounds,
        sightings = summary.sightings,
        interrupted = summary.interrupted,
        "Scanning finished"
    );
    Ok(summary)
}

fn deadline_after(now: Instant, wait: Duration) -> Instant {
    now.checked_add(wait).unwrap_or_else(|| now + FAR_FUTURE)
}
