//! Domain event system: progress notifications out of the control loop.
//!
//! The orchestrator publishes an event at every decision point. The CLI's
//! `--verbose` mode subscribes to print step-by-step progress; nothing in the
//! loop depends on anyone listening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::agent::{Action, RefinementRecord, RunStatus};

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A run was admitted and is about to enter the router
    RunStarted {
        run_id: String,
        question: String,
        mode: String,
        timestamp: DateTime<Utc>,
    },

    /// The router picked the next action
    ActionDecided {
        run_id: String,
        action: Action,
        step: usize,
        timestamp: DateTime<Utc>,
    },

    /// A search or quality refinement was appended to the log
    RefinementRecorded {
        run_id: String,
        record: RefinementRecord,
        timestamp: DateTime<Utc>,
    },

    /// The safety guard forced a stop or vetoed an action
    SafetyStop {
        run_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The run reached END
    RunFinished {
        run_id: String,
        status: RunStatus,
        quality_score: Option<u8>,
        steps: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
