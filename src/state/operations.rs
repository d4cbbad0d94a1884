//! Storage operations produced by state transitions.

use crate::error::StorageError;
use crate::storage::StorageRelation;
use crate::types::{Identity, ObjectKey, OperationKind, Tuple};
use std::fmt;
use std::sync::Arc;

/// What an operation does to its relation.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Insert the full tuple.
    Insert(Tuple),
    /// Write the given attributes.
    Update(Tuple),
    /// Remove the stored tuple.
    Delete,
    /// Forget an object that never reached storage.
    Discard,
}

/// A queued write bound to the relation it executes against.
#[derive(Clone)]
pub struct Operation {
    relation: Arc<dyn StorageRelation>,
    key: ObjectKey,
    command: Command,
}

impl Operation {
    pub fn new(relation: Arc<dyn StorageRelation>, identity: Identity, command: Command) -> Self {
        let key = ObjectKey::new(relation.name(), identity);
        Self {
            relation,
            key,
            command,
        }
    }

    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    pub fn identity(&self) -> &Identity {
        &self.key.identity
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn kind(&self) -> OperationKind {
        match self.command {
            Command::Insert(_) => OperationKind::Insert,
            Command::Update(_) => OperationKind::Update,
            Command::Delete => OperationKind::Delete,
            Command::Discard => OperationKind::Discard,
        }
    }

    /// Execute against the bound relation.
    pub fn execute(&self) -> Result<(), StorageError> {
        match &self.command {
            Command::Insert(tuple) => self.relation.insert(tuple),
            Command::Update(tuple) => self.relation.update(&self.key.identity, tuple),
            Command::Delete => self.relation.delete(&self.key.identity),
            Command::Discard => Ok(()),
        }
    }

    /// Fold a later operation for the same object into this one.
    ///
    /// Returns `false` when the pair cannot be collapsed and `later` must be
    /// queued on its own.
    pub(crate) fn absorb(&mut self, later: &Operation) -> bool {
        debug_assert_eq!(self.key, later.key);

        let command = match (&self.command, &later.command) {
            (Command::Insert(tuple), Command::Insert(more))
            | (Command::Insert(tuple), Command::Update(more)) => {
                Command::Insert(tuple.merged(more))
            }
            (Command::Update(changes), Command::Update(more)) => {
                Command::Update(changes.merged(more))
            }
            (Command::Insert(_), Command::Delete) => Command::Discard,
            (Command::Update(_), Command::Delete) => Command::Delete,
            (_, Command::Discard) => return true,
            (Command::Delete, _) | (Command::Discard, _) => return true,
            (Command::Update(_), Command::Insert(_)) => return false,
        };

        self.command = command;
        true
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("key", &self.key)
            .field("command", &self.command)
            .finish()
    }
}
