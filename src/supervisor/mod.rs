//! Supervisor Layer
//!
//! Tracks recurring runtime errors as issues and closes them once the
//! decision loop is healthy again.

pub mod issue_tracker;

pub use issue_tracker::{IssueEvent, IssueRecord, IssueTracker};
