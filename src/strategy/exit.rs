use chrono::Utc;

use crate::domain::{ExitDecision, ExitRoute, IndicatorSnapshot};

/// Route-2 signal exit: SuperTrend bearish and RSI above the mid threshold
pub fn signal_exit_flag(snapshot: &IndicatorSnapshot, rsi_mid: f64) -> bool {
    snapshot.is_bearish() && snapshot.rsi > rsi_mid
}

/// Combine both routes; the risk route wins when both fire.
pub fn evaluate_exit(risk_flag: bool, signal_flag: bool) -> ExitDecision {
    let (exit_now, route, reason) = if risk_flag {
        (true, Some(ExitRoute::IntrabarRisk), "Risk governor triggered")
    } else if signal_flag {
        (true, Some(ExitRoute::SignalExit), "SuperTrend Red AND RSI above mid")
    } else {
        (false, None, "No exit condition met")
    };

    ExitDecision {
        exit_now,
        route,
        reason: reason.to_string(),
        ts: Utc::now(),
    }
}
