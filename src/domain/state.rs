use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::execution::{ExecutionIntent, OrderBasket};
use super::gear::{Gear, VixGearContext};
use super::signal::SpotSignal;

/// Position lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LifecycleState {
    /// No open position
    Flat,
    /// Entry recorded, not yet confirmed by a monitoring tick
    Entered,
    /// Position is being monitored
    Holding,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Flat => "FLAT",
            LifecycleState::Entered => "ENTERED",
            LifecycleState::Holding => "HOLDING",
        }
    }

    /// Check if this state can transition to another state
    pub fn can_transition_to(&self, target: LifecycleState) -> bool {
        use LifecycleState::*;

        matches!(
            (self, target),
            (Flat, Entered) | (Entered, Holding) | (Entered, Flat) | (Holding, Flat)
        )
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, LifecycleState::Flat)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for LifecycleState {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "FLAT" => Ok(LifecycleState::Flat),
            "ENTERED" => Ok(LifecycleState::Entered),
            "HOLDING" => Ok(LifecycleState::Holding),
            _ => Err(format!("Unknown state: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
}

/// How the risk governor marks and stops a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionKind {
    Future,
    Options,
}

/// What was bought, kept for risk evaluation while the position is open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryContext {
    pub gear: Gear,
    pub lots: u32,
    /// Units marked for PnL (lots x lot size)
    pub quantity: u32,
    pub kind: PositionKind,
    pub atr_at_entry: f64,
}

/// Realized result of a closed trade, written together with the FLAT
/// transition so the PnL side can book it later if its own write fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitBooking {
    /// Trade number this exit closed
    pub trade_count: u64,
    pub realized_delta: Decimal,
    pub exit_price: f64,
    pub ts: DateTime<Utc>,
}

/// Persisted position record. `position` and `entry_price` are set iff the
/// state is not FLAT; `trade_count` never decreases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    pub state: LifecycleState,
    pub position: Option<PositionSide>,
    pub entry_price: Option<f64>,
    pub entry_ts: Option<DateTime<Utc>>,
    pub trade_count: u64,
    #[serde(default)]
    pub entry: Option<EntryContext>,
    #[serde(default)]
    pub last_exit: Option<ExitBooking>,
}

impl Default for PositionState {
    fn default() -> Self {
        Self {
            state: LifecycleState::Flat,
            position: None,
            entry_price: None,
            entry_ts: None,
            trade_count: 0,
            entry: None,
            last_exit: None,
        }
    }
}

impl PositionState {
    pub fn is_flat(&self) -> bool {
        self.state == LifecycleState::Flat
    }

    /// Exit recorded by the lifecycle but not yet included in `pnl`
    pub fn unbooked_exit(&self, pnl: &PnLState) -> Option<&ExitBooking> {
        self.last_exit
            .as_ref()
            .filter(|b| b.trade_count > pnl.booked_trade_count)
    }

    /// Entry fields agree with the lifecycle state
    pub fn is_consistent(&self) -> bool {
        let has_entry = self.position.is_some() && self.entry_price.is_some();
        let no_entry =
            self.position.is_none() && self.entry_price.is_none() && self.entry.is_none();
        if self.state.is_open() {
            has_entry
        } else {
            no_entry
        }
    }
}

/// Persisted PnL record; `equity == realized + unrealized`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnLState {
    pub realized: Decimal,
    pub unrealized: Decimal,
    pub equity: Decimal,
    pub ts: DateTime<Utc>,
    /// Highest trade number whose exit is included in `realized`
    #[serde(default)]
    pub booked_trade_count: u64,
}

impl Default for PnLState {
    fn default() -> Self {
        Self {
            realized: Decimal::ZERO,
            unrealized: Decimal::ZERO,
            equity: Decimal::ZERO,
            ts: Utc::now(),
            booked_trade_count: 0,
        }
    }
}

/// One line of the equity curve journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub ts: DateTime<Utc>,
    pub equity: Decimal,
}

/// Signal armed on one bar, waiting for the next bar to confirm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub armed_bar_epoch: i64,
    pub armed_signal: SpotSignal,
}

/// Persisted signal state: last evaluation, dedup key and pending entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalStateSnapshot {
    pub last_signal: Option<SpotSignal>,
    /// Start epoch of the last hourly bar evaluated
    pub last_bar_epoch: Option<i64>,
    pub pending: Option<PendingEntry>,
}

/// Persisted gear selection with the lots it sized to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VixGearState {
    pub context: VixGearContext,
    pub lots: u32,
    pub capital: Decimal,
}

/// Persisted last gate decision and the basket built for it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    pub last_intent: Option<ExecutionIntent>,
    pub basket: Option<OrderBasket>,
}
