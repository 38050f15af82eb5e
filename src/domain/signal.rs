use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SuperTrend direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendDirection {
    Bullish,
    Bearish,
}

impl TrendDirection {
    /// +1 for bullish, -1 for bearish
    pub fn value(&self) -> i8 {
        match self {
            TrendDirection::Bullish => 1,
            TrendDirection::Bearish => -1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Bullish => "BULLISH",
            TrendDirection::Bearish => "BEARISH",
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Indicator values on the newest closed hourly bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    /// Start epoch of the hourly bar these values belong to
    pub bar_epoch: i64,
    pub close: f64,
    pub ema: f64,
    pub rsi: f64,
    pub atr: f64,
    pub supertrend: f64,
    pub direction: TrendDirection,
    /// Direction on the preceding bar; `None` when there is no preceding bar
    pub prev_direction: Option<TrendDirection>,
    /// Number of hourly bars the values were computed from
    pub bars: usize,
}

impl IndicatorSnapshot {
    /// Direction turned from bearish to bullish on this bar
    pub fn flipped_bullish(&self) -> bool {
        self.prev_direction == Some(TrendDirection::Bearish)
            && self.direction == TrendDirection::Bullish
    }

    pub fn is_bearish(&self) -> bool {
        self.direction == TrendDirection::Bearish
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalState {
    EntryArmed,
    Wait,
}

impl SignalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalState::EntryArmed => "ENTRY_ARMED",
            SignalState::Wait => "WAIT",
        }
    }
}

impl fmt::Display for SignalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Entry signal derived from one indicator snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotSignal {
    pub state: SignalState,
    pub reason: String,
    pub snapshot: IndicatorSnapshot,
    pub ts: DateTime<Utc>,
}

impl SpotSignal {
    pub fn is_armed(&self) -> bool {
        self.state == SignalState::EntryArmed
    }
}
