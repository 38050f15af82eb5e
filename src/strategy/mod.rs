pub mod basket;
pub mod exit;
pub mod gate;
pub mod gear;
pub mod indicators;
pub mod lifecycle;
pub mod pending_entry;
pub mod pnl;
pub mod risk;
pub mod signal;

pub use basket::BasketBuilder;
pub use exit::{evaluate_exit, signal_exit_flag};
pub use gate::{ExecutionGate, GateInputs};
pub use gear::VixGearSelector;
pub use indicators::{compute_snapshot, IndicatorParams};
pub use lifecycle::PositionLifecycle;
pub use pending_entry::{PendingEntryTracker, PendingStatus, PendingView};
pub use pnl::{realized_delta, to_money, PnLEngine};
pub use risk::RiskGovernor;
pub use signal::SpotSignalGenerator;
