//! Decision Coordinator
//!
//! Owns the decision loop: the engine that wires signal, gear, gate,
//! basket, lifecycle, risk and PnL together, the bootstrap that builds it
//! from config, and the read-only status report.

pub mod bootstrap;
pub mod engine;
pub mod state;

pub use bootstrap::{
    bootstrap, build_runtime, file_storage, replay_gateway, run_once, run_until_shutdown, Runtime,
};
pub use engine::{DecisionEngine, EngineDeps, TickOutcome};
pub use state::StatusReport;
