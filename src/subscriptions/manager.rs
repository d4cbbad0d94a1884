//! Subscription manager for broadcasting session events.

use crate::state::Operation;
use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

use super::types::{
    CommitSummary, DropReason, SessionEvent, SubscriptionConfig, SubscriptionHandle,
    SubscriptionId,
};

/// Internal subscription state.
struct Subscription {
    config: SubscriptionConfig,
    sender: Sender<SessionEvent>,
}

impl Subscription {
    /// Try to send an event. Returns false if buffer is full (subscriber will be dropped).
    fn try_send(&self, event: SessionEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(crossbeam_channel::TrySendError::Full(_)) => false,
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => false,
        }
    }

    fn wants_queue(&self, relation: &str) -> bool {
        self.config.filter.include_queue && self.config.filter.matches_relation(relation)
    }

    fn wants_commit(&self, relation: Option<&str>) -> bool {
        if !self.config.filter.include_commit {
            return false;
        }
        relation.map_or(true, |r| self.config.filter.matches_relation(r))
    }
}

/// Manages subscriptions and broadcasts events.
pub struct SubscriptionManager {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a new subscription.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size);

        self.subscriptions
            .write()
            .insert(id, Subscription { config, sender });

        SubscriptionHandle { id, receiver }
    }

    /// Unsubscribe and clean up.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subscriptions.write();
        if let Some(sub) = subs.remove(&id) {
            // Best effort
            let _ = sub.sender.try_send(SessionEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    // --- Broadcasting ---

    pub fn broadcast_queued(&self, operation: &Operation) {
        let relation = operation.key().relation.as_str();
        let event = SessionEvent::Queued {
            relation: relation.to_string(),
            identity: operation.identity().clone(),
            kind: operation.kind(),
        };

        self.broadcast(|sub| sub.wants_queue(relation), event);
    }

    pub fn broadcast_executed(&self, operation: &Operation) {
        let relation = operation.key().relation.as_str();
        let event = SessionEvent::Executed {
            relation: relation.to_string(),
            identity: operation.identity().clone(),
            kind: operation.kind(),
        };

        self.broadcast(|sub| sub.wants_commit(Some(relation)), event);
    }

    pub fn broadcast_failed(&self, operation: &Operation, error: &str) {
        let relation = operation.key().relation.as_str();
        let event = SessionEvent::Failed {
            relation: relation.to_string(),
            identity: operation.identity().clone(),
            kind: operation.kind(),
            error: error.to_string(),
        };

        self.broadcast(|sub| sub.wants_commit(Some(relation)), event);
    }

    pub fn broadcast_committed(&self, summary: CommitSummary) {
        self.broadcast(
            |sub| sub.wants_commit(None),
            SessionEvent::Committed { summary },
        );
    }

    /// Drops subscribers that fail to receive.
    fn broadcast<F>(&self, filter: F, event: SessionEvent)
    where
        F: Fn(&Subscription) -> bool,
    {
        let mut to_remove = Vec::new();

        {
            let subs = self.subscriptions.read();
            for (id, sub) in subs.iter() {
                if filter(sub) && !sub.try_send(event.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscriptions.write();
            for id in to_remove {
                if let Some(sub) = subs.remove(&id) {
                    warn!(subscription = id.0, "dropping slow session subscriber");
                    let _ = sub.sender.try_send(SessionEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}
