//! Session: owns the tracker and hands out session relations.

use crate::config::SessionConfig;
use crate::error::Result;
use crate::mapper::Mapper;
use crate::relation::SessionRelation;
use crate::storage::StorageRelation;
use crate::subscriptions::{
    CommitSummary, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
};
use crate::tracker::Tracker;
use std::sync::Arc;
use tracing::debug;

/// A unit of work.
///
/// Every relation obtained from one session shares its tracker, so an
/// object's state and the commit order are session-wide. Sessions never
/// share trackers with each other.
pub struct Session {
    /// Session configuration.
    config: SessionConfig,

    /// Identity map and commit queue.
    tracker: Arc<Tracker>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let tracker = Arc::new(Tracker::new(config.queue_policy));
        Self { config, tracker }
    }

    /// Run `f` in a fresh session and commit when it returns `Ok`.
    ///
    /// Nothing is committed if `f` fails.
    pub fn start<T, F>(config: SessionConfig, f: F) -> Result<(T, CommitSummary)>
    where
        F: FnOnce(&Session) -> Result<T>,
    {
        let session = Session::new(config);
        let value = f(&session)?;
        let summary = session.commit()?;
        Ok((value, summary))
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Bind a storage relation and its mapper to this session.
    pub fn relation<M: Mapper>(
        &self,
        relation: Arc<dyn StorageRelation>,
        mapper: Arc<M>,
    ) -> SessionRelation<M> {
        debug!(relation = relation.name(), "binding relation to session");
        SessionRelation::build(relation, mapper, Arc::clone(&self.tracker))
    }

    /// Flush all queued operations to storage, oldest first.
    pub fn commit(&self) -> Result<CommitSummary> {
        self.tracker.commit()
    }

    /// True when no operations are waiting for commit.
    pub fn is_clean(&self) -> bool {
        self.tracker.is_clean()
    }

    /// Number of queued operations.
    pub fn pending(&self) -> usize {
        self.tracker.pending()
    }

    /// Subscribe to session events with the configured buffer size.
    pub fn subscribe(&self, filter: SubscriptionFilter) -> SubscriptionHandle {
        self.tracker.subscribe(SubscriptionConfig {
            buffer_size: self.config.event_buffer_size,
            filter,
        })
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
