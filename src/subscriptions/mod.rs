//! Subscription system for observing a session.
//!
//! Subscribers receive queue and commit events over bounded channels:
//! - Operations entering the commit queue
//! - Each operation executed (or failing) during commit
//! - Commit summaries
//!
//! A subscriber whose buffer fills up is dropped rather than blocking the
//! session.
//!
//! # Example
//!
//! ```ignore
//! let handle = session.subscribe(SubscriptionConfig {
//!     filter: SubscriptionFilter::relations(vec!["users".to_string()]),
//!     ..Default::default()
//! });
//!
//! users.save(&user)?;
//! session.commit()?;
//!
//! for event in handle.drain() {
//!     println!("{:?}", event);
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    CommitSummary, DropReason, SessionEvent, SubscriptionConfig, SubscriptionFilter,
    SubscriptionHandle, SubscriptionId,
};
