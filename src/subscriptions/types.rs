//! Subscription types for observing a session's unit of work.

use crate::types::{Identity, OperationKind};
use serde::{Deserialize, Serialize};

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before dropping subscriber.
    /// Default: 1000
    pub buffer_size: usize,

    /// Filter criteria.
    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            filter: SubscriptionFilter::all(),
        }
    }
}

/// Filter criteria for subscriptions.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    /// Filter by relation name (None = all relations).
    pub relations: Option<Vec<String>>,

    /// Include events for operations entering the queue.
    pub include_queue: bool,

    /// Include per-operation commit events and commit summaries.
    pub include_commit: bool,
}

impl SubscriptionFilter {
    /// Subscribe to queueing only.
    pub fn queue() -> Self {
        Self {
            include_queue: true,
            ..Default::default()
        }
    }

    /// Subscribe to commit progress only.
    pub fn commit() -> Self {
        Self {
            include_commit: true,
            ..Default::default()
        }
    }

    /// Restrict to specific relations.
    pub fn relations(relations: Vec<String>) -> Self {
        Self {
            relations: Some(relations),
            include_queue: true,
            include_commit: true,
        }
    }

    /// Subscribe to everything.
    pub fn all() -> Self {
        Self {
            relations: None,
            include_queue: true,
            include_commit: true,
        }
    }

    pub(crate) fn matches_relation(&self, relation: &str) -> bool {
        match self.relations {
            Some(ref names) => names.iter().any(|name| name == relation),
            None => true,
        }
    }
}

/// Events broadcast by a session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// An operation entered the commit queue.
    Queued {
        relation: String,
        identity: Identity,
        kind: OperationKind,
    },

    /// An operation executed during commit.
    Executed {
        relation: String,
        identity: Identity,
        kind: OperationKind,
    },

    /// An operation failed and halted the commit.
    Failed {
        relation: String,
        identity: Identity,
        kind: OperationKind,
        error: String,
    },

    /// A commit drained the queue.
    Committed { summary: CommitSummary },

    /// Subscription was dropped.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Counts of operations executed by one commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Discarded objects that never reached storage.
    pub discarded: usize,
}

impl CommitSummary {
    pub fn record(&mut self, kind: OperationKind) {
        match kind {
            OperationKind::Insert => self.inserted += 1,
            OperationKind::Update => self.updated += 1,
            OperationKind::Delete => self.deleted += 1,
            OperationKind::Discard => self.discarded += 1,
        }
    }

    /// Total operations executed, including discards.
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.deleted + self.discarded
    }
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to manage a subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<SessionEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<SessionEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<SessionEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<SessionEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<SessionEvent> {
        self.receiver.try_iter().collect()
    }
}
