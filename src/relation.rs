//! Session relation: the public face of one storage relation in a session.
//!
//! Each call turns a caller intent into a state lookup and transition, and
//! queues the resulting operation on the session's tracker in a single
//! tracker step. Nothing touches storage until the session commits.

use crate::error::{Result, SessionError};
use crate::mapper::Mapper;
use crate::state::State;
use crate::storage::StorageRelation;
use crate::tracker::Tracker;
use crate::types::{Identity, ObjectKey, Tuple};
use std::sync::Arc;

/// A storage relation bound to a session's tracker and a mapper.
pub struct SessionRelation<M: Mapper> {
    relation: Arc<dyn StorageRelation>,
    mapper: Arc<M>,
    tracker: Arc<Tracker>,
}

impl<M: Mapper> Clone for SessionRelation<M> {
    fn clone(&self) -> Self {
        Self {
            relation: Arc::clone(&self.relation),
            mapper: Arc::clone(&self.mapper),
            tracker: Arc::clone(&self.tracker),
        }
    }
}

impl<M: Mapper> SessionRelation<M> {
    pub(crate) fn build(
        relation: Arc<dyn StorageRelation>,
        mapper: Arc<M>,
        tracker: Arc<Tracker>,
    ) -> Self {
        Self {
            relation,
            mapper,
            tracker,
        }
    }

    /// Name of the underlying storage relation.
    pub fn name(&self) -> &str {
        self.relation.name()
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Queue an object to be saved.
    ///
    /// A transient object is inserted; one already bound for storage gets a
    /// full-tuple update.
    pub fn save(&self, object: &M::Object) -> Result<&Self> {
        let identity = self.identity(object)?;
        let tuple = self.mapper.dump(object)?;
        let key = self.key(identity.clone());

        self.tracker.transition(&key, |state| {
            let untracked = State::default();
            state
                .unwrap_or(&untracked)
                .save(&self.relation, &identity, tuple)
        })?;
        Ok(self)
    }

    /// Queue an update of only the attributes in `tuple`.
    ///
    /// The object must already be tracked and bound for storage. Changing a
    /// key attribute is rejected.
    pub fn update_attributes(&self, object: &M::Object, tuple: Tuple) -> Result<&Self> {
        let identity = self.identity(object)?;
        let key = self.key(identity.clone());

        self.tracker.transition(&key, |state| {
            let state = state.ok_or_else(|| SessionError::UnknownIdentity {
                relation: key.relation.clone(),
                identity: identity.clone(),
            })?;

            let transition = state.update(&self.relation, &identity, tuple.clone())?;
            self.ensure_identity_kept(&identity, state, &tuple)?;
            Ok(transition)
        })?;
        Ok(self)
    }

    /// Queue an object to be deleted. It stays tracked until commit.
    pub fn delete(&self, object: &M::Object) -> Result<&Self> {
        let identity = self.identity(object)?;
        let key = self.key(identity.clone());

        self.tracker.transition(&key, |state| {
            let untracked = State::default();
            Ok(state.unwrap_or(&untracked).delete(&self.relation, &identity))
        })?;
        Ok(self)
    }

    /// Current state of an object; transient if not tracked.
    pub fn state(&self, object: &M::Object) -> Result<State> {
        let identity = self.identity(object)?;
        Ok(self.tracker.fetch(&self.key(identity)))
    }

    pub fn identity(&self, object: &M::Object) -> Result<Identity> {
        self.mapper.identity(object)
    }

    /// Start tracking an object as transient. Tracking twice is a no-op.
    pub fn track(&self, object: &M::Object) -> Result<&Self> {
        let identity = self.identity(object)?;
        let tuple = self.mapper.dump(object)?;

        self.tracker.store_transient(self.key(identity), tuple);
        Ok(self)
    }

    /// Build a new object through the mapper and track it.
    pub fn new_object(&self, args: M::Args) -> Result<M::Object> {
        let object = self.mapper.new_object(args)?;
        self.track(&object)?;
        Ok(object)
    }

    /// Build an object from a stored tuple and track it as persisted.
    pub fn load(&self, tuple: &Tuple) -> Result<M::Object> {
        let object = self.mapper.load(tuple)?;
        let identity = self.identity(&object)?;
        let snapshot = self.mapper.dump(&object)?;

        self.tracker.store_persisted(self.key(identity), snapshot);
        Ok(object)
    }

    /// True for objects that never reached storage and for objects whose
    /// attributes differ from their last-persisted snapshot.
    pub fn is_dirty(&self, object: &M::Object) -> Result<bool> {
        match self.state(object)?.snapshot() {
            Some(snapshot) => self.mapper.dirty(object, snapshot),
            None => Ok(true),
        }
    }

    pub fn is_tracking(&self, object: &M::Object) -> Result<bool> {
        let identity = self.identity(object)?;
        Ok(self.tracker.includes(&self.key(identity)))
    }

    fn key(&self, identity: Identity) -> ObjectKey {
        ObjectKey::new(self.relation.name(), identity)
    }

    fn ensure_identity_kept(&self, identity: &Identity, state: &State, changes: &Tuple) -> Result<()> {
        let updated = self.mapper.load(&state.tuple().merged(changes))?;
        if self.mapper.identity(&updated)? != *identity {
            return Err(SessionError::IllegalTransition {
                from: state.name(),
                intent: "change the identity of",
            });
        }
        Ok(())
    }
}
