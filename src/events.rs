//! Shared install event bus.
//!
//! A single multiplexed broadcast channel carries events for whichever
//! install is currently running; sessions subscribe with a [`StepSubscription`]
//! that fans out only the events tagged with their step identity.
//!
//! The subscribe-before-invoke ordering contract lives here: a
//! `StepSubscription` must exist *before* the backend operation it observes
//! is started, otherwise early events are lost. The session API enforces this
//! by consuming an already-constructed subscription.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

use crate::prereq::PrerequisiteKind;

// ─── Event schema ────────────────────────────────────────────────────────────

/// Progress event emitted by the installer backend while an operation runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstallEvent {
    /// The backend has begun work on the step.
    Start { step: PrerequisiteKind },
    /// One raw output line from the underlying process.
    Output { step: PrerequisiteKind, line: String },
    /// The install is blocked on a user action (e.g. a sign-in prompt).
    ActionRequired {
        step: PrerequisiteKind,
        message: String,
    },
    /// Terminal: the operation finished.
    Done {
        step: PrerequisiteKind,
        success: bool,
    },
    /// Terminal: the operation failed with a message. No `done` follows.
    Error {
        step: PrerequisiteKind,
        message: String,
    },
}

impl InstallEvent {
    pub fn step(&self) -> PrerequisiteKind {
        match self {
            InstallEvent::Start { step }
            | InstallEvent::Output { step, .. }
            | InstallEvent::ActionRequired { step, .. }
            | InstallEvent::Done { step, .. }
            | InstallEvent::Error { step, .. } => *step,
        }
    }
}

// ─── Bus ─────────────────────────────────────────────────────────────────────

/// Broadcasts [`InstallEvent`]s to all subscribers.
///
/// Cheaply cloneable; the backend holds one clone to emit into, the
/// orchestrator holds another to subscribe from.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<InstallEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers. No subscribers is fine — the event
    /// is simply dropped.
    pub fn emit(&self, event: InstallEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to events for one step. Must be called before the backend
    /// operation for that step is invoked.
    pub fn subscribe_step(&self, step: PrerequisiteKind) -> StepSubscription {
        StepSubscription {
            step,
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live receivers — used by tests to verify subscriptions are
    /// active at invoke time and released after settlement.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

// ─── Per-step subscription ───────────────────────────────────────────────────

/// A live subscription to the bus, filtered to a single step identity.
///
/// Dropping the subscription releases the underlying receiver; a session
/// does this exactly once, when it settles.
pub struct StepSubscription {
    step: PrerequisiteKind,
    rx: broadcast::Receiver<InstallEvent>,
}

impl StepSubscription {
    pub fn step(&self) -> PrerequisiteKind {
        self.step
    }

    /// Receive the next event for this step, skipping events addressed to
    /// other steps. Returns `None` when the bus itself has shut down.
    ///
    /// A lagged receiver (bus overran the buffer) is logged and skipped —
    /// dropped progress lines are cosmetic, and terminal events are re-read
    /// from the resumed position.
    pub async fn next(&mut self) -> Option<InstallEvent> {
        loop {
            match self.rx.recv().await {
                Ok(ev) if ev.step() == self.step => return Some(ev),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(step = %self.step, missed, "event subscription lagged — skipping");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscription_filters_by_step() {
        let bus = EventBus::new(16);
        let mut sub = bus.subscribe_step(PrerequisiteKind::Runtime);

        bus.emit(InstallEvent::Output {
            step: PrerequisiteKind::Toolchain,
            line: "other step".into(),
        });
        bus.emit(InstallEvent::Output {
            step: PrerequisiteKind::Runtime,
            line: "mine".into(),
        });

        let ev = sub.next().await.unwrap();
        match ev {
            InstallEvent::Output { step, line } => {
                assert_eq!(step, PrerequisiteKind::Runtime);
                assert_eq!(line, "mine");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropping_subscription_releases_receiver() {
        let bus = EventBus::new(16);
        assert_eq!(bus.receiver_count(), 0);
        let sub = bus.subscribe_step(PrerequisiteKind::AgentCli);
        assert_eq!(bus.receiver_count(), 1);
        drop(sub);
        assert_eq!(bus.receiver_count(), 0);
    }

    #[test]
    fn event_json_schema() {
        let ev = InstallEvent::Done {
            step: PrerequisiteKind::AgentCli,
            success: true,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "done");
        assert_eq!(json["step"], "agent_cli");
        assert_eq!(json["success"], true);
    }
}
