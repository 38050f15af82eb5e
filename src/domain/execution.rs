use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::gear::Gear;
use super::state::PositionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Intent {
    Execute,
    Wait,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Execute => "EXECUTE",
            Intent::Wait => "WAIT",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Guards of the execution gate, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardKind {
    SpotSignal,
    PendingEntry,
    PrevClose,
    Basis,
    VixGear,
}

impl GuardKind {
    pub const ORDER: [GuardKind; 5] = [
        GuardKind::SpotSignal,
        GuardKind::PendingEntry,
        GuardKind::PrevClose,
        GuardKind::Basis,
        GuardKind::VixGear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GuardKind::SpotSignal => "SPOT_SIGNAL",
            GuardKind::PendingEntry => "PENDING_ENTRY",
            GuardKind::PrevClose => "PREV_CLOSE",
            GuardKind::Basis => "BASIS",
            GuardKind::VixGear => "VIX_GEAR",
        }
    }
}

/// Outcome of the execution gate. `gear` is set iff `intent` is EXECUTE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionIntent {
    pub intent: Intent,
    pub gear: Option<Gear>,
    pub reason: String,
    /// Guards actually evaluated, in order; the last one decided a WAIT
    pub guards_evaluated: Vec<GuardKind>,
    pub ts: DateTime<Utc>,
}

impl ExecutionIntent {
    pub fn execute(gear: Gear, guards_evaluated: Vec<GuardKind>) -> Self {
        Self {
            intent: Intent::Execute,
            gear: Some(gear),
            reason: "All guards passed".to_string(),
            guards_evaluated,
            ts: Utc::now(),
        }
    }

    pub fn wait(reason: impl Into<String>, guards_evaluated: Vec<GuardKind>) -> Self {
        Self {
            intent: Intent::Wait,
            gear: None,
            reason: reason.into(),
            guards_evaluated,
            ts: Utc::now(),
        }
    }

    pub fn is_execute(&self) -> bool {
        self.intent == Intent::Execute
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LegSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Instrument {
    Future,
    Call,
    Put,
}

impl Instrument {
    pub fn is_option(&self) -> bool {
        matches!(self, Instrument::Call | Instrument::Put)
    }
}

/// One leg of an order basket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLeg {
    pub side: LegSide,
    pub instrument: Instrument,
    /// Points from the ATM strike; `None` for futures
    pub strike_offset: Option<i64>,
    /// Resolved strike (ATM + offset)
    pub strike: Option<i64>,
    pub qty_lots: u32,
}

/// Multi-leg order template for one gear
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBasket {
    pub gear: Gear,
    pub legs: Vec<OrderLeg>,
    /// Sized lots the template multiples were scaled by
    pub lots: u32,
    pub risk_note: String,
    pub ts: DateTime<Utc>,
}

impl OrderBasket {
    /// A basket holding only futures legs is marked and stopped like a future
    pub fn is_pure_future(&self) -> bool {
        !self.legs.is_empty()
            && self
                .legs
                .iter()
                .all(|leg| leg.instrument == Instrument::Future)
    }

    pub fn position_kind(&self) -> PositionKind {
        if self.is_pure_future() {
            PositionKind::Future
        } else {
            PositionKind::Options
        }
    }
}
