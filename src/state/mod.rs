//! Object lifecycle state.
//!
//! Each tracked object is in exactly one [`State`]. Transitions decide
//! between insert, update and delete so callers never have to, and hand
//! back the [`Operation`] to queue for commit.

mod operations;
mod transitions;

pub use operations::{Command, Operation};
pub use transitions::{State, Transition};
