//! # Relation Session
//!
//! A unit-of-work session between in-memory domain objects and tuple-based
//! storage relations.
//!
//! ## Core Concepts
//!
//! - **State**: Each tracked object is transient, created, updated, deleted
//!   or persisted
//! - **Tracker**: Session-scoped identity map plus an ordered queue of
//!   pending storage operations
//! - **Session Relation**: Turns save/update/delete intents into state
//!   transitions and queued operations
//! - **Commit**: Drains the queue against storage in the order it was built
//!
//! ## Example
//!
//! ```ignore
//! use relation_session::{MemoryRelation, SerdeMapper, Session, Tuple};
//!
//! let session = Session::default();
//! let users = session.relation(
//!     Arc::new(MemoryRelation::new("users", ["id"])),
//!     Arc::new(SerdeMapper::<User>::new(["id"])),
//! );
//!
//! let user = users.new_object(Tuple::new().with("id", 1).with("name", "Jane"))?;
//! users.save(&user)?;
//! session.commit()?;
//!
//! users.update_attributes(&user, Tuple::new().with("name", "Bob"))?;
//! session.commit()?;
//! ```

pub mod config;
pub mod error;
pub mod mapper;
pub mod relation;
pub mod session;
pub mod state;
pub mod storage;
pub mod subscriptions;
pub mod tracker;
pub mod types;

// Re-exports
pub use config::{QueuePolicy, SessionConfig};
pub use error::{Result, SessionError, StorageError};
pub use mapper::{Mapper, SerdeMapper};
pub use relation::SessionRelation;
pub use session::Session;
pub use state::{Command, Operation, State, Transition};
pub use storage::{MemoryRelation, StorageRelation};
pub use subscriptions::{
    CommitSummary, DropReason, SessionEvent, SubscriptionConfig, SubscriptionFilter,
    SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
pub use tracker::Tracker;
pub use types::*;
