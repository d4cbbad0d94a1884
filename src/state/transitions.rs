//! Object lifecycle states and their transitions.

use super::operations::{Command, Operation};
use crate::error::{Result, SessionError};
use crate::storage::StorageRelation;
use crate::types::{Identity, Tuple};
use std::sync::Arc;

/// Lifecycle state of one tracked object.
///
/// Every variant carries the object's last-known tuple. States that may
/// still hold a pending write also keep the last-persisted `snapshot`, which
/// is `None` when the object never reached storage.
#[derive(Clone, Debug, PartialEq)]
pub enum State {
    /// Known to the session, not in storage.
    Transient { tuple: Tuple },
    /// Queued for insertion.
    Created { tuple: Tuple },
    /// Queued for an attribute update. `changes` accumulates every pending
    /// attribute write, most recent value per key.
    Updated {
        tuple: Tuple,
        changes: Tuple,
        snapshot: Option<Tuple>,
    },
    /// Queued for removal.
    Deleted {
        tuple: Tuple,
        snapshot: Option<Tuple>,
    },
    /// In storage with no pending mutation.
    Persisted { tuple: Tuple },
}

/// Result of a transition: the operation to queue and the state that follows.
#[derive(Debug)]
pub struct Transition {
    pub operation: Operation,
    pub next: State,
}

impl Default for State {
    fn default() -> Self {
        State::Transient {
            tuple: Tuple::new(),
        }
    }
}

impl State {
    pub fn name(&self) -> &'static str {
        match self {
            State::Transient { .. } => "transient",
            State::Created { .. } => "created",
            State::Updated { .. } => "updated",
            State::Deleted { .. } => "deleted",
            State::Persisted { .. } => "persisted",
        }
    }

    pub fn tuple(&self) -> &Tuple {
        match self {
            State::Transient { tuple }
            | State::Created { tuple }
            | State::Updated { tuple, .. }
            | State::Deleted { tuple, .. }
            | State::Persisted { tuple } => tuple,
        }
    }

    /// Tuple as last known to be in storage.
    pub fn snapshot(&self) -> Option<&Tuple> {
        match self {
            State::Transient { .. } | State::Created { .. } => None,
            State::Updated { snapshot, .. } | State::Deleted { snapshot, .. } => {
                snapshot.as_ref()
            }
            State::Persisted { tuple } => Some(tuple),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, State::Transient { .. })
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, State::Persisted { .. })
    }

    /// Save the object's current attributes.
    ///
    /// Inserts a transient object. Anything already bound for storage gets a
    /// full-tuple update instead; a second save before commit never inserts
    /// twice.
    pub fn save(
        &self,
        relation: &Arc<dyn StorageRelation>,
        identity: &Identity,
        tuple: Tuple,
    ) -> Result<Transition> {
        match self {
            State::Transient { .. } => Ok(Transition {
                operation: Operation::new(
                    Arc::clone(relation),
                    identity.clone(),
                    Command::Insert(tuple.clone()),
                ),
                next: State::Created { tuple },
            }),
            State::Created { .. } | State::Persisted { .. } | State::Updated { .. } => {
                self.write(relation, identity, tuple)
            }
            State::Deleted { .. } => Err(self.illegal("save")),
        }
    }

    /// Update only the attributes in `changes`.
    pub fn update(
        &self,
        relation: &Arc<dyn StorageRelation>,
        identity: &Identity,
        changes: Tuple,
    ) -> Result<Transition> {
        match self {
            State::Created { .. } | State::Persisted { .. } | State::Updated { .. } => {
                self.write(relation, identity, changes)
            }
            State::Transient { .. } | State::Deleted { .. } => Err(self.illegal("update")),
        }
    }

    /// Delete the object. Objects that never reached storage are discarded
    /// without a storage call.
    pub fn delete(&self, relation: &Arc<dyn StorageRelation>, identity: &Identity) -> Transition {
        let command = match self {
            State::Transient { .. } | State::Deleted { .. } => Command::Discard,
            State::Created { .. } | State::Updated { .. } | State::Persisted { .. } => {
                Command::Delete
            }
        };

        Transition {
            operation: Operation::new(Arc::clone(relation), identity.clone(), command),
            next: State::Deleted {
                tuple: self.tuple().clone(),
                snapshot: self.snapshot().cloned(),
            },
        }
    }

    fn write(
        &self,
        relation: &Arc<dyn StorageRelation>,
        identity: &Identity,
        changes: Tuple,
    ) -> Result<Transition> {
        let (tuple, pending) = match self {
            State::Updated {
                tuple,
                changes: pending,
                ..
            } => (tuple, pending.clone()),
            other => (other.tuple(), Tuple::new()),
        };

        Ok(Transition {
            operation: Operation::new(
                Arc::clone(relation),
                identity.clone(),
                Command::Update(changes.clone()),
            ),
            next: State::Updated {
                tuple: tuple.merged(&changes),
                changes: pending.merged(&changes),
                snapshot: self.snapshot().cloned(),
            },
        })
    }

    fn illegal(&self, intent: &'static str) -> SessionError {
        SessionError::IllegalTransition {
            from: self.name(),
            intent,
        }
    }
}
