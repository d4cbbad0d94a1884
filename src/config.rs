//! Session configuration.

/// How the commit queue treats repeated operations for one object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueuePolicy {
    /// Replay every queued operation in order.
    #[default]
    Fifo,
    /// Fold a requeue into the object's pending operation, keeping the
    /// position where the object was first queued.
    Collapse,
}

/// Session configuration.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Queue policy for repeated operations on one object.
    pub queue_policy: QueuePolicy,

    /// Default buffer size for event subscriptions.
    pub event_buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_policy: QueuePolicy::Fifo,
            event_buffer_size: 1000,
        }
    }
}
