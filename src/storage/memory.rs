//! In-memory storage relation.

use super::StorageRelation;
use crate::error::StorageError;
use crate::types::{Identity, Tuple};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// A relation held in memory, keyed by the identity of its key attributes.
pub struct MemoryRelation {
    /// Relation name.
    name: String,

    /// Key attribute names, in identity order.
    keys: Vec<String>,

    /// Stored tuples by identity.
    tuples: RwLock<BTreeMap<Identity, Tuple>>,
}

impl MemoryRelation {
    /// Create an empty relation with the given key attributes.
    pub fn new<S: Into<String>>(name: impl Into<String>, keys: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            keys: keys.into_iter().map(Into::into).collect(),
            tuples: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Get the stored tuple for an identity.
    pub fn get(&self, identity: &Identity) -> Option<Tuple> {
        self.tuples.read().get(identity).cloned()
    }

    /// All stored tuples, in identity order.
    pub fn all(&self) -> Vec<Tuple> {
        self.tuples.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tuples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.read().is_empty()
    }

    fn identity_of(&self, tuple: &Tuple) -> Result<Identity, StorageError> {
        Identity::from_tuple(tuple, self.keys.as_slice()).map_err(|attribute| StorageError::MissingKey {
            relation: self.name.clone(),
            attribute,
        })
    }

    fn not_found(&self, identity: &Identity) -> StorageError {
        StorageError::NotFound {
            relation: self.name.clone(),
            identity: identity.clone(),
        }
    }
}

impl StorageRelation for MemoryRelation {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert(&self, tuple: &Tuple) -> Result<(), StorageError> {
        let identity = self.identity_of(tuple)?;
        let mut tuples = self.tuples.write();

        if tuples.contains_key(&identity) {
            return Err(StorageError::DuplicateKey {
                relation: self.name.clone(),
                identity,
            });
        }

        tuples.insert(identity, tuple.clone());
        Ok(())
    }

    fn update(&self, identity: &Identity, tuple: &Tuple) -> Result<(), StorageError> {
        let mut tuples = self.tuples.write();
        let stored = tuples
            .get_mut(identity)
            .ok_or_else(|| self.not_found(identity))?;
        stored.merge(tuple);
        Ok(())
    }

    fn delete(&self, identity: &Identity) -> Result<(), StorageError> {
        self.tuples
            .write()
            .remove(identity)
            .map(|_| ())
            .ok_or_else(|| self.not_found(identity))
    }
}
