pub mod adapters;
pub mod cli;
pub mod config;
pub mod coordination;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod strategy;
pub mod supervisor;

pub use config::AppConfig;
pub use coordination::{QuoteCache, QuoteFeed, RetryPolicy, ShutdownController};
pub use coordinator::{DecisionEngine, EngineDeps, StatusReport, TickOutcome};
pub use error::{GearError, Result};
pub use persistence::{EventLog, JsonFileStore, MemoryStore, StateStore, Storage};
pub use supervisor::IssueTracker;
