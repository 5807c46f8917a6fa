//! # Event Bus System
//!
//! Broadcasts sync progress using `tokio::sync::broadcast` so the engine can
//! report what it is doing without knowing who (if anyone) is listening.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐   emit   ┌───────────┐  subscribe  ┌──────────────┐
//! │ SyncCoordinator ├─────────>│ EventBus  ├────────────>│ CLI renderer │
//! └─────────────────┘          └───────────┘             └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, SyncEvent, SyncPhase};
//!
//! let event_bus = EventBus::new(100);
//! let mut receiver = event_bus.subscribe();
//!
//! event_bus.emit(SyncEvent::PhaseStarted { phase: SyncPhase::Reconcile });
//! assert!(receiver.try_recv().is_ok());
//! ```
//!
//! Emitting with no subscribers is not an error; progress is advisory.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast::{self, Receiver};

/// Default number of buffered events per subscriber.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 1024;

/// The sequential phases of one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// Advisory pre-pass counting matching remote objects
    Counting,
    /// Creating and restamping sidecar records
    Reconcile,
    /// Deleting sidecar records not confirmed in this run
    Sweep,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Counting => "counting",
            SyncPhase::Reconcile => "reconcile",
            SyncPhase::Sweep => "sweep",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted while a sync run progresses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// Run initiated.
    RunStarted {
        /// Stamp written into every record confirmed by this run.
        run_stamp: i64,
    },
    /// The advisory pre-pass finished counting.
    TotalCounted {
        /// Number of remote objects matching the extension filter.
        total: u64,
    },
    /// A phase began.
    PhaseStarted { phase: SyncPhase },
    /// Incremental progress within a phase.
    Progress {
        phase: SyncPhase,
        /// Items finished so far.
        processed: u64,
        /// Expected total, when a pre-pass ran.
        total: Option<u64>,
    },
    /// A phase finished.
    PhaseCompleted {
        phase: SyncPhase,
        processed: u64,
        /// Records created (reconcile) or deleted (sweep).
        changed: u64,
        failed: u64,
        duration_ms: u64,
    },
    /// The whole run finished.
    RunCompleted {
        run_stamp: i64,
        created: u64,
        restamped: u64,
        deleted: u64,
        failed: u64,
        duration_ms: u64,
    },
    /// The run aborted on a fatal error.
    RunFailed {
        run_stamp: i64,
        message: String,
    },
}

impl SyncEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            SyncEvent::RunStarted { .. } => "Sync run started",
            SyncEvent::TotalCounted { .. } => "Remote objects counted",
            SyncEvent::PhaseStarted { .. } => "Phase started",
            SyncEvent::Progress { .. } => "Phase in progress",
            SyncEvent::PhaseCompleted { .. } => "Phase completed",
            SyncEvent::RunCompleted { .. } => "Sync run completed",
            SyncEvent::RunFailed { .. } => "Sync run failed",
        }
    }

    /// Whether this event ends the run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncEvent::RunCompleted { .. } | SyncEvent::RunFailed { .. }
        )
    }
}

/// Central event bus for broadcasting sync events.
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers falling behind by more than `capacity` events receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received it; zero when nobody
    /// is listening.
    pub fn emit(&self, event: SyncEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(8);
        assert_eq!(bus.emit(SyncEvent::TotalCounted { total: 3 }), 0);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_events() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let delivered = bus.emit(SyncEvent::PhaseStarted {
            phase: SyncPhase::Sweep,
        });
        assert_eq!(delivered, 2);

        let expected = SyncEvent::PhaseStarted {
            phase: SyncPhase::Sweep,
        };
        assert_eq!(first.recv().await.unwrap(), expected);
        assert_eq!(second.recv().await.unwrap(), expected);
        assert!(matches!(first.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_terminal_events() {
        assert!(SyncEvent::RunFailed {
            run_stamp: 1,
            message: "boom".into()
        }
        .is_terminal());
        assert!(!SyncEvent::TotalCounted { total: 1 }.is_terminal());
    }

    #[test]
    fn test_event_serialization() {
        let event = SyncEvent::Progress {
            phase: SyncPhase::Reconcile,
            processed: 5,
            total: Some(10),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"Progress\""));
        assert!(json.contains("\"phase\":\"reconcile\""));
    }
}
