//! Cumulative run counters.
//!
//! Counts what has been processed across runs so a user can see at a glance
//! how much data went through the tool and what came out.

pub mod log;

pub use log::{
    create_shared_log, create_shared_log_with_persistence, Counter, RunLog, RunStats, RunTotals,
    SharedRunLog,
};
