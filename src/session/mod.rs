//! Session-scoped bookkeeping.
//!
//! - `tracker`: which photos were dispositioned during the current session
//! - `stats`: counters and timestamps of the current session, and the
//!   day's tally across sessions

pub mod stats;
pub mod tracker;

pub use stats::{DailyTally, WorkflowSessionStats};
pub use tracker::{SessionOutcomeSets, SessionTracker};
