use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Volatility-selected strategy tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gear {
    NoTrade,
    Low,
    Medium,
    High,
}

impl Gear {
    /// Lots per reference capital
    pub fn multiplier(&self) -> u32 {
        match self {
            Gear::NoTrade => 0,
            Gear::Low => 1,
            Gear::Medium => 2,
            Gear::High => 3,
        }
    }

    /// Name of the order template this gear trades
    pub fn strategy_name(&self) -> &'static str {
        match self {
            Gear::NoTrade => "NoTrade",
            Gear::Low => "RatioSpread",
            Gear::Medium => "BullCallSpread",
            Gear::High => "SafeFuture",
        }
    }

    pub fn is_tradable(&self) -> bool {
        self.multiplier() > 0
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gear::NoTrade => "NO_TRADE",
            Gear::Low => "LOW",
            Gear::Medium => "MEDIUM",
            Gear::High => "HIGH",
        }
    }
}

impl fmt::Display for Gear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.as_str(), self.strategy_name())
    }
}

/// Gear chosen for one volatility reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VixGearContext {
    pub vix: f64,
    pub gear: Gear,
    pub reason: String,
    pub ts: DateTime<Utc>,
}
