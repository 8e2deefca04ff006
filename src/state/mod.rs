//! Event journaling
//!
//! Handles:
//! - Append-only storage of every protocol event
//! - Message status tracking for relayer dashboards
//! - Submission statistics

mod journal;
mod manager;

pub use journal::{EventJournal, MemoryJournal};
pub use manager::{MessageStats, StateManager};
