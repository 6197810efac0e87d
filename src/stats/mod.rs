//! Session statistics
//!
//! Counters shared across the pipeline stages of one session, plus a
//! point-in-time snapshot for reporting.

mod metrics;

pub use metrics::{SessionStats, StatsSnapshot};
