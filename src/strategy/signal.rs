use chrono::Utc;

use crate::domain::{IndicatorSnapshot, SignalState, SpotSignal};

/// Turns an indicator snapshot into ENTRY_ARMED or WAIT.
///
/// Conditions are checked in a fixed order and a WAIT names the first one
/// that failed.
#[derive(Debug, Clone)]
pub struct SpotSignalGenerator {
    entry_rsi_max: f64,
}

impl Default for SpotSignalGenerator {
    fn default() -> Self {
        Self::new(65.0)
    }
}

impl SpotSignalGenerator {
    pub fn new(entry_rsi_max: f64) -> Self {
        Self { entry_rsi_max }
    }

    pub fn evaluate(&self, snapshot: &IndicatorSnapshot) -> SpotSignal {
        let (state, reason) = match self.first_failure(snapshot) {
            None => (
                SignalState::EntryArmed,
                format!(
                    "ST reversal + close>EMA + RSI<{}",
                    self.entry_rsi_max
                ),
            ),
            Some(reason) => (SignalState::Wait, reason),
        };

        SpotSignal {
            state,
            reason,
            snapshot: snapshot.clone(),
            ts: Utc::now(),
        }
    }

    fn first_failure(&self, s: &IndicatorSnapshot) -> Option<String> {
        if !s.flipped_bullish() {
            return Some(format!(
                "SuperTrend did not flip bullish (prev {}, now {})",
                s.prev_direction.map_or("NONE", |d| d.as_str()),
                s.direction
            ));
        }
        if s.rsi >= self.entry_rsi_max {
            return Some(format!(
                "RSI {:.2} not below {}",
                s.rsi, self.entry_rsi_max
            ));
        }
        if s.close < s.supertrend {
            return Some(format!(
                "close {:.2} below SuperTrend {:.2}",
                s.close, s.supertrend
            ));
        }
        if s.close <= s.ema {
            return Some(format!("close {:.2} not above EMA {:.2}", s.close, s.ema));
        }
        None
    }
}
