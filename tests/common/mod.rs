//! Shared fixtures for integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use relation_session::{
    Identity, MemoryRelation, SerdeMapper, Session, SessionRelation, StorageError,
    StorageRelation, Tuple, Value,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
}

pub fn user(id: i64, name: &str) -> User {
    User {
        id,
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
    }
}

pub fn id(n: i64) -> Identity {
    Identity(vec![Value::Int(n)])
}

/// Storage call as seen by a relation, e.g. `insert users[1]`.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Memory relation that logs every storage call and can be told to fail one.
pub struct RecordingRelation {
    pub inner: MemoryRelation,
    calls: CallLog,
    fail_on: Mutex<Option<String>>,
}

impl RecordingRelation {
    pub fn new(name: &str, calls: CallLog) -> Self {
        Self {
            inner: MemoryRelation::new(name, ["id"]),
            calls,
            fail_on: Mutex::new(None),
        }
    }

    /// Fail the call whose log line equals `call`, e.g. `"insert users[2]"`.
    pub fn fail_on(&self, call: &str) {
        *self.fail_on.lock() = Some(call.to_string());
    }

    pub fn heal(&self) {
        *self.fail_on.lock() = None;
    }

    fn record(&self, call: String) -> Result<(), StorageError> {
        if self.fail_on.lock().as_deref() == Some(call.as_str()) {
            return Err(StorageError::Backend(format!("injected failure: {}", call)));
        }
        self.calls.lock().push(call);
        Ok(())
    }
}

impl StorageRelation for RecordingRelation {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn insert(&self, tuple: &Tuple) -> Result<(), StorageError> {
        let identity = Identity::from_tuple(tuple, self.inner.keys())
            .unwrap_or_else(|_| Identity(Vec::new()));
        self.record(format!("insert {}{}", self.name(), identity))?;
        self.inner.insert(tuple)
    }

    fn update(&self, identity: &Identity, tuple: &Tuple) -> Result<(), StorageError> {
        let attrs: Vec<&str> = tuple.keys().collect();
        self.record(format!(
            "update {}{} {}",
            self.name(),
            identity,
            attrs.join(",")
        ))?;
        self.inner.update(identity, tuple)
    }

    fn delete(&self, identity: &Identity) -> Result<(), StorageError> {
        self.record(format!("delete {}{}", self.name(), identity))?;
        self.inner.delete(identity)
    }
}

/// A session with a recording `users` relation.
pub struct Fixture {
    pub session: Session,
    pub storage: Arc<RecordingRelation>,
    pub users: SessionRelation<SerdeMapper<User>>,
    pub calls: CallLog,
}

impl Fixture {
    pub fn new(session: Session) -> Self {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        let storage = Arc::new(RecordingRelation::new("users", Arc::clone(&calls)));
        let shared: Arc<dyn StorageRelation> = storage.clone();
        let users = session.relation(shared, Arc::new(SerdeMapper::new(["id"])));

        Self {
            session,
            storage,
            users,
            calls,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn stored(&self, n: i64) -> Option<Tuple> {
        self.storage.inner.get(&id(n))
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}
