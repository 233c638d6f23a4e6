//! Post-commit event emission
//!
//! After a transaction commits, the changelog is drained into the event
//! bus: each entry's delta is merged and grouped by subject, and one event
//! is published per distinct subject. Delivery is best-effort and
//! asynchronous with respect to the client response; a dead subscriber is
//! dropped with a warning and never fails the committed transaction.

use crate::tbox::Toolbox;
use crate::tx::ChangelogEntry;
use oxrdf::Subject;
use serde::Serialize;
use std::fmt;
use std::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// Lifecycle event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Created => write!(f, "created"),
            EventKind::Updated => write!(f, "updated"),
            EventKind::Deleted => write!(f, "deleted"),
        }
    }
}

/// One notification about a modified resource
#[derive(Debug, Clone, Serialize)]
pub struct ResourceEvent {
    /// Globalized subject URI
    pub subject: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Request timestamp, RFC 3339
    pub timestamp: String,
    /// `rdf:type` objects in the merged delta
    pub rdf_types: Vec<String>,
    /// `fcrepo:createdBy` actors in the merged delta
    pub actors: Vec<String>,
}

impl ResourceEvent {
    /// JSON wire form for downstream messaging
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Multi-subscriber event fan-out over unbounded channels.
pub struct EventBus {
    subscribers: Mutex<Vec<UnboundedSender<ResourceEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register a subscriber; events published from now on are delivered
    /// to the returned receiver.
    pub fn subscribe(&self) -> UnboundedReceiver<ResourceEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers().push(tx);
        rx
    }

    /// Drain a committed changelog: group each entry's merged delta by
    /// subject and publish one event per distinct subject, in enqueue
    /// order.
    pub fn emit_changelog(&self, tbox: &Toolbox, entries: Vec<ChangelogEntry>) {
        for entry in entries {
            let merged = &entry.remove | &entry.add;
            let mut subjects: Vec<Subject> = merged.subjects();
            subjects.sort_by_key(|s| s.to_string());

            for s in subjects {
                let Subject::NamedNode(n) = s else { continue };
                let event = ResourceEvent {
                    subject: tbox.globalize_term(&n).as_str().to_string(),
                    kind: entry.meta.ev_type,
                    timestamp: entry.meta.timestamp.clone(),
                    rdf_types: entry.meta.rdf_types.clone(),
                    actors: entry.meta.actors.clone(),
                };
                debug!("Emitting {} event for {}", event.kind, event.subject);
                self.publish(event);
            }
        }
    }

    fn publish(&self, event: ResourceEvent) {
        let mut subs = self.subscribers();
        subs.retain(|tx| {
            if tx.send(event.clone()).is_err() {
                warn!("Dropping dead event subscriber");
                false
            } else {
                true
            }
        });
    }

    fn subscribers(&self) -> std::sync::MutexGuard<'_, Vec<UnboundedSender<ResourceEvent>>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
