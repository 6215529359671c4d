//! Event types for the irck event system
//!
//! Session components emit [`IrEvent`]s on an [`EventBus`]
//! (tokio broadcast): one-to-many, lossy for slow subscribers. The CLI
//! subscribes to drive operator prompts; nothing in the codec path ever
//! blocks on a subscriber.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Session events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IrEvent {
    /// A recording session began
    RecordStarted {
        commands: Vec<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Waiting for the operator to press the key for a command
    AwaitingPress {
        command: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A code was captured and normalized for a command
    CodeCaptured {
        command: String,
        pulses: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A capture was too short (button repeat or bounce); awaiting a retry
    ShortCodeRetry {
        command: String,
        pulses: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A capture ended without a code (subscription torn down)
    CaptureCancelled {
        command: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The library was normalized and written to disk
    LibrarySaved {
        commands: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A chain was submitted to the output line
    PlaybackStarted {
        command: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Transmission completed and segment handles were released
    PlaybackFinished {
        command: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// One-to-many event broadcaster.
///
/// Cloning is cheap; all clones share the same channel. Subscribers only
/// receive events emitted after they subscribe, and slow subscribers drop
/// the oldest events rather than applying backpressure.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<IrEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<IrEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns the subscriber count, or an error if nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: IrEvent,
    ) -> Result<usize, broadcast::error::SendError<IrEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring whether anyone is listening.
    pub fn emit_lossy(&self, event: IrEvent) {
        if self.tx.send(event).is_err() {
            debug!("event emitted with no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(128)
    }
}
