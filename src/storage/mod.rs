//! Storage relations the session flushes into.
//!
//! The session does not implement a relational engine. It depends on the
//! [`StorageRelation`] capability set and ships an in-memory relation for
//! tests and embedding.

mod memory;

pub use memory::MemoryRelation;

use crate::error::StorageError;
use crate::types::{Identity, Tuple};

/// A named relation that executes tuple-level writes.
///
/// Writes run during a session commit with the session's identity map
/// unlocked; an implementation may read session state but must not commit
/// the session it is being flushed from.
pub trait StorageRelation: Send + Sync {
    /// Relation name. Identities are scoped to it inside a session.
    fn name(&self) -> &str;

    /// Insert a full tuple.
    fn insert(&self, tuple: &Tuple) -> Result<(), StorageError>;

    /// Write only the attributes present in `tuple` to the stored tuple.
    fn update(&self, identity: &Identity, tuple: &Tuple) -> Result<(), StorageError>;

    /// Remove the tuple with this identity.
    fn delete(&self, identity: &Identity) -> Result<(), StorageError>;
}
