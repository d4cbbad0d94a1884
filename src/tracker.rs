//! Identity-keyed state registry and commit queue.
//!
//! The tracker is scoped to one session. Its identity map and queue sit
//! behind a single lock so every relation in the session can share it:
//! a state lookup, its transition and the resulting queue entry happen under
//! that one lock. Commits are serialized separately and run storage calls
//! with the map unlocked.

use crate::config::QueuePolicy;
use crate::error::Result;
use crate::state::{Operation, State, Transition};
use crate::subscriptions::{
    CommitSummary, SubscriptionConfig, SubscriptionHandle, SubscriptionManager,
};
use crate::types::{ObjectKey, OperationKind, Tuple};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, trace, warn};

struct Inner {
    /// Current state of every tracked object.
    states: HashMap<ObjectKey, State>,
    /// Pending operations, oldest first.
    queue: VecDeque<Operation>,
}

impl Inner {
    fn has_pending(&self, key: &ObjectKey) -> bool {
        self.queue.iter().any(|op| op.key() == key)
    }

    /// Settle an object's state once its last pending operation executed.
    fn finalize(&mut self, operation: &Operation) {
        let key = operation.key();
        if self.has_pending(key) {
            return;
        }

        match operation.kind() {
            OperationKind::Insert | OperationKind::Update => {
                if let Some(state) = self.states.get_mut(key) {
                    let tuple = state.tuple().clone();
                    *state = State::Persisted { tuple };
                }
            }
            OperationKind::Delete | OperationKind::Discard => {
                self.states.remove(key);
            }
        }
    }
}

/// Session-scoped registry of object states and pending operations.
pub struct Tracker {
    policy: QueuePolicy,
    inner: Mutex<Inner>,
    /// Held for the whole of a commit.
    committing: Mutex<()>,
    events: SubscriptionManager,
}

impl Tracker {
    pub fn new(policy: QueuePolicy) -> Self {
        Self {
            policy,
            inner: Mutex::new(Inner {
                states: HashMap::new(),
                queue: VecDeque::new(),
            }),
            committing: Mutex::new(()),
            events: SubscriptionManager::new(),
        }
    }

    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }

    /// Current state for `key`, or a transient state if it is not tracked.
    pub fn fetch(&self, key: &ObjectKey) -> State {
        self.get(key).unwrap_or_default()
    }

    /// Current state for `key`, if tracked.
    pub fn get(&self, key: &ObjectKey) -> Option<State> {
        self.inner.lock().states.get(key).cloned()
    }

    pub fn includes(&self, key: &ObjectKey) -> bool {
        self.inner.lock().states.contains_key(key)
    }

    /// Start tracking an object as transient.
    ///
    /// Returns `false` if the object was already tracked; its state is left
    /// untouched.
    pub fn store_transient(&self, key: ObjectKey, tuple: Tuple) -> bool {
        match self.inner.lock().states.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                trace!(key = %slot.key(), "tracking transient object");
                slot.insert(State::Transient { tuple });
                true
            }
        }
    }

    /// Track an object loaded from storage.
    ///
    /// Objects with a pending operation keep their state; returns `false` in
    /// that case.
    pub fn store_persisted(&self, key: ObjectKey, tuple: Tuple) -> bool {
        let mut inner = self.inner.lock();
        match inner.states.get(&key) {
            None | Some(State::Transient { .. }) | Some(State::Persisted { .. }) => {
                trace!(key = %key, "tracking persisted object");
                inner.states.insert(key, State::Persisted { tuple });
                true
            }
            Some(_) => false,
        }
    }

    /// Look up the state for `key`, transition it and queue the result as
    /// one step. `apply` sees `None` for untracked objects; an error leaves
    /// the tracker untouched.
    ///
    /// `apply` runs under the tracker lock and must not call back into the
    /// session.
    pub fn transition<F>(&self, key: &ObjectKey, apply: F) -> Result<()>
    where
        F: FnOnce(Option<&State>) -> Result<Transition>,
    {
        let mut inner = self.inner.lock();
        let transition = apply(inner.states.get(key))?;
        self.enqueue(&mut inner, transition);
        Ok(())
    }

    /// Queue a transition's operation and advance the object's state.
    pub fn queue(&self, transition: Transition) {
        let mut inner = self.inner.lock();
        self.enqueue(&mut inner, transition);
    }

    fn enqueue(&self, inner: &mut Inner, transition: Transition) {
        let Transition { operation, next } = transition;

        debug!(
            key = %operation.key(),
            kind = %operation.kind(),
            state = next.name(),
            "queueing operation"
        );

        self.events.broadcast_queued(&operation);
        inner.states.insert(operation.key().clone(), next);

        if self.policy == QueuePolicy::Collapse {
            let pending = inner
                .queue
                .iter_mut()
                .rev()
                .find(|op| op.key() == operation.key());
            if let Some(pending) = pending {
                if pending.absorb(&operation) {
                    return;
                }
            }
        }

        inner.queue.push_back(operation);
    }

    /// Drain the queue against storage in insertion order.
    ///
    /// Stops at the first storage error, which is returned as is. Operations
    /// executed before it stay applied and their objects settle; the failed
    /// operation and everything after it stay queued.
    ///
    /// Storage calls run without the tracker lock, so a storage relation may
    /// read session state. Starting another commit from inside one blocks.
    pub fn commit(&self) -> Result<CommitSummary> {
        let _committing = self.committing.lock();
        let mut summary = CommitSummary::default();

        debug!(pending = self.pending(), "committing session");

        loop {
            let next = self.inner.lock().queue.pop_front();
            let operation = match next {
                Some(operation) => operation,
                None => break,
            };

            if let Err(e) = operation.execute() {
                let mut inner = self.inner.lock();
                warn!(
                    key = %operation.key(),
                    kind = %operation.kind(),
                    error = %e,
                    remaining = inner.queue.len() + 1,
                    "storage operation failed, halting commit"
                );
                self.events.broadcast_failed(&operation, &e.to_string());
                inner.queue.push_front(operation);
                return Err(e.into());
            }

            trace!(key = %operation.key(), kind = %operation.kind(), "executed operation");
            summary.record(operation.kind());
            self.events.broadcast_executed(&operation);
            self.inner.lock().finalize(&operation);
        }

        debug!(executed = summary.total(), "commit finished");
        self.events.broadcast_committed(summary);

        Ok(summary)
    }

    /// Number of tracked objects.
    pub fn len(&self) -> usize {
        self.inner.lock().states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().states.is_empty()
    }

    /// Number of queued operations.
    pub fn pending(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Snapshot of the queue, oldest first.
    pub fn pending_operations(&self) -> Vec<(ObjectKey, OperationKind)> {
        self.inner
            .lock()
            .queue
            .iter()
            .map(|op| (op.key().clone(), op.kind()))
            .collect()
    }

    /// True when nothing is waiting to be committed.
    pub fn is_clean(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        self.events.subscribe(config)
    }

    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        self.events.unsubscribe(handle.id);
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(QueuePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::{MemoryRelation, StorageRelation};
    use crate::types::{Identity, Value};
    use std::sync::Arc;

    fn users() -> (Arc<MemoryRelation>, Arc<dyn StorageRelation>) {
        let relation = Arc::new(MemoryRelation::new("users", ["id"]));
        let shared: Arc<dyn StorageRelation> = relation.clone();
        (relation, shared)
    }

    fn id(n: i64) -> Identity {
        Identity(vec![Value::Int(n)])
    }

    fn key(n: i64) -> ObjectKey {
        ObjectKey::new("users", id(n))
    }

    fn user(n: i64, name: &str) -> Tuple {
        Tuple::new().with("id", n).with("name", name)
    }

    #[test]
    fn test_fetch_untracked_is_transient() {
        let tracker = Tracker::default();
        assert!(tracker.fetch(&key(1)).is_transient());
        assert!(!tracker.includes(&key(1)));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_store_transient_is_idempotent() {
        let tracker = Tracker::default();
        assert!(tracker.store_transient(key(1), user(1, "Jane")));
        assert!(!tracker.store_transient(key(1), user(1, "Other")));

        assert_eq!(tracker.len(), 1);
        assert_eq!(
            tracker.fetch(&key(1)),
            State::Transient {
                tuple: user(1, "Jane")
            }
        );
    }

    #[test]
    fn test_store_persisted_keeps_pending_state() {
        let (_, shared) = users();
        let tracker = Tracker::default();

        let t = State::default().save(&shared, &id(1), user(1, "Jane")).unwrap();
        tracker.queue(t);

        assert!(!tracker.store_persisted(key(1), user(1, "Stored")));
        assert_eq!(tracker.fetch(&key(1)).name(), "created");

        assert!(tracker.store_persisted(key(2), user(2, "Bob")));
        assert!(tracker.fetch(&key(2)).is_persisted());
    }

    #[test]
    fn test_commit_settles_states() {
        let (relation, shared) = users();
        let tracker = Tracker::default();

        tracker.store_transient(key(1), user(1, "Jane"));
        let t = tracker.fetch(&key(1)).save(&shared, &id(1), user(1, "Jane")).unwrap();
        tracker.queue(t);
        assert_eq!(tracker.pending(), 1);

        let summary = tracker.commit().unwrap();
        assert_eq!(summary.inserted, 1);
        assert!(tracker.is_clean());
        assert!(tracker.fetch(&key(1)).is_persisted());
        assert_eq!(relation.len(), 1);
    }

    #[test]
    fn test_fifo_keeps_pending_state_until_last_operation() {
        let (relation, shared) = users();
        let tracker = Tracker::default();

        let t = State::default().save(&shared, &id(1), user(1, "Jane")).unwrap();
        tracker.queue(t);
        let t = tracker
            .fetch(&key(1))
            .update(&shared, &id(1), Tuple::new().with("name", "Bob"))
            .unwrap();
        tracker.queue(t);

        assert_eq!(
            tracker.pending_operations(),
            vec![
                (key(1), OperationKind::Insert),
                (key(1), OperationKind::Update)
            ]
        );

        tracker.commit().unwrap();
        assert_eq!(
            tracker.fetch(&key(1)),
            State::Persisted {
                tuple: user(1, "Bob")
            }
        );
        assert_eq!(relation.get(&id(1)), Some(user(1, "Bob")));
    }

    #[test]
    fn test_collapse_folds_same_identity() {
        let (relation, shared) = users();
        let tracker = Tracker::new(QueuePolicy::Collapse);

        let t = State::default().save(&shared, &id(1), user(1, "Jane")).unwrap();
        tracker.queue(t);
        let t = State::default().save(&shared, &id(2), user(2, "Ann")).unwrap();
        tracker.queue(t);
        let t = tracker
            .fetch(&key(1))
            .update(&shared, &id(1), Tuple::new().with("name", "Bob"))
            .unwrap();
        tracker.queue(t);

        assert_eq!(
            tracker.pending_operations(),
            vec![
                (key(1), OperationKind::Insert),
                (key(2), OperationKind::Insert)
            ]
        );

        tracker.commit().unwrap();
        assert_eq!(relation.get(&id(1)), Some(user(1, "Bob")));
    }

    #[test]
    fn test_rejected_transition_leaves_tracker_untouched() {
        let (_, shared) = users();
        let tracker = Tracker::default();
        tracker.store_transient(key(1), user(1, "Jane"));

        let result = tracker.transition(&key(1), |state| {
            state
                .cloned()
                .unwrap_or_default()
                .update(&shared, &id(1), Tuple::new().with("name", "Bob"))
        });

        assert!(result.is_err());
        assert!(tracker.is_clean());
        assert!(tracker.fetch(&key(1)).is_transient());
    }

    /// Storage relation that inspects the tracker while it stores.
    struct Inspecting {
        inner: MemoryRelation,
        tracker: Arc<Tracker>,
        seen: Mutex<Vec<(usize, bool)>>,
    }

    impl StorageRelation for Inspecting {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn insert(&self, tuple: &Tuple) -> std::result::Result<(), StorageError> {
            self.seen
                .lock()
                .push((self.tracker.pending(), self.tracker.includes(&key(1))));
            self.inner.insert(tuple)
        }

        fn update(
            &self,
            identity: &Identity,
            tuple: &Tuple,
        ) -> std::result::Result<(), StorageError> {
            self.inner.update(identity, tuple)
        }

        fn delete(&self, identity: &Identity) -> std::result::Result<(), StorageError> {
            self.inner.delete(identity)
        }
    }

    #[test]
    fn test_storage_can_read_tracker_during_commit() {
        let tracker = Arc::new(Tracker::default());
        let storage = Arc::new(Inspecting {
            inner: MemoryRelation::new("users", ["id"]),
            tracker: Arc::clone(&tracker),
            seen: Mutex::new(Vec::new()),
        });
        let shared: Arc<dyn StorageRelation> = storage.clone();

        for n in 1..=2 {
            let t = State::default().save(&shared, &id(n), user(n, "u")).unwrap();
            tracker.queue(t);
        }

        let summary = tracker.commit().unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(*storage.seen.lock(), vec![(1, true), (0, true)]);
        assert!(tracker.fetch(&key(2)).is_persisted());
    }

    #[test]
    fn test_failed_delete_stays_queued() {
        let (_, shared) = users();
        let tracker = Tracker::default();

        tracker.store_persisted(key(1), user(1, "Jane"));
        let t = tracker.fetch(&key(1)).delete(&shared, &id(1));
        tracker.queue(t);
        assert_eq!(tracker.fetch(&key(1)).name(), "deleted");

        // Nothing stored under that identity
        let result = tracker.commit();
        assert!(result.is_err());
        assert!(tracker.includes(&key(1)));
        assert_eq!(tracker.pending(), 1);
    }
}
