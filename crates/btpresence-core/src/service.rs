//! Single-writer ownership of the presence tracker.
//!
//! [`TrackerHandle::spawn`] moves a [`PresenceTracker`] into its own tokio task
//! and returns a cloneable handle. Every operation is a message on one bounded
//! queue, so the task applies them strictly in send order:
//!
//! ```text
//!  scanner ──record──┐
//!  scanner ──record──┼──► [ bounded mpsc ] ──► tracker task ──► PresenceTracker
//!  driver  ──export──┘                              │
//!                                    oneshot ◄──────┘ snapshot
//! ```
//!
//! An export therefore observes every event sent before it on the same handle
//! (or on a clone whose send completed first).

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::tracker::PresenceTracker;
use crate::types::{DeviceRecord, SightingEvent};

/// Default queue depth between producers and the tracker task.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Errors from talking to the tracker task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The tracker task has shut down.
    #[error("tracker task has stopped")]
    Closed,
}

/// Result type for tracker service operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

enum Command {
    Record(SightingEvent),
    RecordBatch(Vec<SightingEvent>),
    Export(oneshot::Sender<Vec<DeviceRecord>>),
    Reset(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<Vec<DeviceRecord>>),
}

/// Cloneable handle to a tracker running in its own task.
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    tx: mpsc::Sender<Command>,
}

impl TrackerHandle {
    /// Spawn a task that owns `tracker` and serves this handle.
    ///
    /// `capacity` bounds the queue; producers wait when it is full. A capacity
    /// of zero is treated as one.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(tracker: PresenceTracker, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(run(tracker, rx));
        Self { tx }
    }

    /// Queue one sighting.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Closed`] if the tracker task has stopped.
    pub async fn record(&self, event: SightingEvent) -> ServiceResult<()> {
        self.send(Command::Record(event)).await
    }

    /// Queue a batch of sightings, applied in order without interleaving.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Closed`] if the tracker task has stopped.
    pub async fn record_batch(&self, events: Vec<SightingEvent>) -> ServiceResult<()> {
        if events.is_empty() {
            return Ok(());
        }
        self.send(Command::RecordBatch(events)).await
    }

    /// Snapshot all device records once queued events have been applied.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Closed`] if the tracker task has stopped.
    pub async fn export(&self) -> ServiceResult<Vec<DeviceRecord>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Export(reply)).await?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    /// Discard all device records.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Closed`] if the tracker task has stopped.
    pub async fn reset(&self) -> ServiceResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Reset(reply)).await?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    /// Stop the tracker task and return its final snapshot.
    ///
    /// Other clones of this handle get [`ServiceError::Closed`] afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Closed`] if the task had already stopped.
    pub async fn shutdown(self) -> ServiceResult<Vec<DeviceRecord>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Shutdown(reply)).await?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    /// `true` once the tracker task has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, command: Command) -> ServiceResult<()> {
        self.tx.send(command).await.map_err(|_| ServiceError::Closed)
    }
}

async fn run(mut tracker: PresenceTracker, mut rx: mpsc::Receiver<Command>) {
    debug!(
        gap_threshold_secs = tracker.gap_threshold().num_seconds(),
        "Tracker task started"
    );

    while let Some(command) = rx.recv().await {
        match command {
            Command::Record(event) => tracker.record(&event),
            Command::RecordBatch(events) => tracker.record_all(&events),
            Command::Export(reply) => {
                let _ = reply.send(tracker.export());
            }
            Command::Reset(reply) => {
                tracker.reset();
                let _ = reply.send(());
            }
            Command::Shutdown(reply) => {
                rx.close();
                let _ = reply.send(tracker.export());
                break;
            }
        }
    }

    info!(devices = tracker.len(), "Tracker task stopped");
}
