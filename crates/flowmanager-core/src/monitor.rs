//! RunMonitor - broadcast of run lifecycle events.
//!
//! The ingress caller never learns how a run ended. Tests, the health
//! endpoint and any other observer subscribe here instead.

use crate::pipeline::{RunId, Stage};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events emitted while a run progresses.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// A token was accepted and the run started
    RunStarted {
        /// Run identifier
        run_id: RunId,
        /// When the token was accepted
        started_at: DateTime<Utc>,
    },
    /// A stage's remote call succeeded
    StageCompleted {
        /// Run identifier
        run_id: RunId,
        /// Completed stage
        stage: Stage,
    },
    /// Preferences and device data were joined
    Joined {
        /// Run identifier
        run_id: RunId,
    },
    /// The snapshot store confirmed the write
    SnapshotPersisted {
        /// Run identifier
        run_id: RunId,
    },
    /// A stage failed and the run stopped
    RunFailed {
        /// Run identifier
        run_id: RunId,
        /// Failing stage
        stage: Stage,
        /// Error message
        error: String,
    },
}

impl RunEvent {
    /// Run this event belongs to.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::StageCompleted { run_id, .. }
            | Self::Joined { run_id }
            | Self::SnapshotPersisted { run_id }
            | Self::RunFailed { run_id, .. } => *run_id,
        }
    }

    /// Whether this event ends its run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::SnapshotPersisted { .. } | Self::RunFailed { .. })
    }
}

/// Counters over all runs since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Runs started
    pub started: u64,
    /// Runs that persisted a snapshot
    pub persisted: u64,
    /// Runs that failed
    pub failed: u64,
}

impl RunStats {
    /// Runs that have neither persisted nor failed.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.started.saturating_sub(self.persisted + self.failed)
    }
}

#[derive(Debug, Default)]
struct Counters {
    started: AtomicU64,
    persisted: AtomicU64,
    failed: AtomicU64,
}

/// Broadcast-based monitor for run events.
///
/// Slow subscribers miss events (lagged) rather than blocking the pipeline.
#[derive(Debug, Clone)]
pub struct RunMonitor {
    sender: broadcast::Sender<RunEvent>,
    counters: Arc<Counters>,
}

impl RunMonitor {
    /// Create a monitor with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            counters: Arc::default(),
        }
    }

    /// Subscribe to all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }

    /// Publish an event and update counters.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, event: RunEvent) -> usize {
        match &event {
            RunEvent::RunStarted { .. } => {
                self.counters.started.fetch_add(1, Ordering::Relaxed);
            }
            RunEvent::SnapshotPersisted { .. } => {
                self.counters.persisted.fetch_add(1, Ordering::Relaxed);
            }
            RunEvent::RunFailed { .. } => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
            }
            RunEvent::StageCompleted { .. } | RunEvent::Joined { .. } => {}
        }
        // No receivers is fine
        self.sender.send(event).unwrap_or(0)
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> RunStats {
        RunStats {
            started: self.counters.started.load(Ordering::Relaxed),
            persisted: self.counters.persisted.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for RunMonitor {
    fn default() -> Self {
        Self::new(256)
    }
}
