use tracing::debug;

use crate::domain::{ExecutionIntent, Gear, GuardKind, SpotSignal};

/// Everything the gate looks at for one decision
#[derive(Debug, Clone)]
pub struct GateInputs<'a> {
    pub signal: &'a SpotSignal,
    /// Pending entry reached the bar after it armed
    pub pending_ok: bool,
    /// Close of the bar being decided on
    pub close: f64,
    /// Previous session close
    pub prev_close: f64,
    pub spot: f64,
    pub future: f64,
    pub gear: Gear,
    /// Lots the gear sized to
    pub lots: u32,
}

/// Sequential guard chain. The first failing guard decides a WAIT and the
/// remaining guards are not evaluated.
#[derive(Debug, Clone)]
pub struct ExecutionGate {
    max_basis: f64,
}

impl Default for ExecutionGate {
    fn default() -> Self {
        Self::new(50.0)
    }
}

impl ExecutionGate {
    pub fn new(max_basis: f64) -> Self {
        Self { max_basis }
    }

    pub fn route(&self, inputs: &GateInputs<'_>) -> ExecutionIntent {
        let mut evaluated = Vec::with_capacity(GuardKind::ORDER.len());

        for guard in GuardKind::ORDER {
            evaluated.push(guard);
            if let Some(reason) = self.check(guard, inputs) {
                debug!(guard = guard.as_str(), reason, "execution guard rejected");
                return ExecutionIntent::wait(reason, evaluated);
            }
        }

        ExecutionIntent::execute(inputs.gear, evaluated)
    }

    /// `None` when the guard passes, otherwise the WAIT reason
    fn check(&self, guard: GuardKind, inputs: &GateInputs<'_>) -> Option<&'static str> {
        match guard {
            GuardKind::SpotSignal => (!inputs.signal.is_armed()).then_some("SpotSignal=WAIT"),
            GuardKind::PendingEntry => (!inputs.pending_ok).then_some("PendingEntry not armed"),
            GuardKind::PrevClose => {
                if inputs.close > inputs.prev_close {
                    None
                } else {
                    Some("PrevClose filter blocked")
                }
            }
            GuardKind::Basis => {
                // NaN compares false and fails closed
                if (inputs.future - inputs.spot).abs() <= self.max_basis {
                    None
                } else {
                    Some("Spot-Fut basis exceeded")
                }
            }
            GuardKind::VixGear => {
                if !inputs.gear.is_tradable() {
                    Some("VIX gear unavailable")
                } else if inputs.lots == 0 {
                    Some("VIX gear sized to zero lots")
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IndicatorSnapshot, Intent, SignalState, TrendDirection};
    use chrono::Utc;

    fn signal(state: SignalState) -> SpotSignal {
        SpotSignal {
            state,
            reason: "test".into(),
            snapshot: IndicatorSnapshot {
                bar_epoch: 7200,
                close: 25100.0,
                ema: 25000.0,
                rsi: 55.0,
                atr: 60.0,
                supertrend: 25050.0,
                direction: TrendDirection::Bullish,
                prev_direction: Some(TrendDirection::Bearish),
                bars: 40,
            },
            ts: Utc::now(),
        }
    }

    fn passing(signal: &SpotSignal) -> GateInputs<'_> {
        GateInputs {
            signal,
            pending_ok: true,
            close: 25100.0,
            prev_close: 25000.0,
            spot: 25100.0,
            future: 25130.0,
            gear: Gear::High,
            lots: 3,
        }
    }

    #[test]
    fn test_all_guards_pass() {
        let sig = signal(SignalState::EntryArmed);
        let intent = ExecutionGate::default().route(&passing(&sig));

        assert_eq!(intent.intent, Intent::Execute);
        assert_eq!(intent.gear, Some(Gear::High));
        assert_eq!(intent.gear.map(|g| g.strategy_name()), Some("SafeFuture"));
        assert_eq!(intent.reason, "All guards passed");
        assert_eq!(intent.guards_evaluated, GuardKind::ORDER.to_vec());
    }

    #[test]
    fn test_signal_wait_short_circuits() {
        let sig = signal(SignalState::Wait);
        let mut inputs = passing(&sig);
        // later guards would all fail too
        inputs.pending_ok = false;
        inputs.prev_close = 30000.0;
        inputs.future = 26000.0;
        inputs.gear = Gear::NoTrade;

        let intent = ExecutionGate::default().route(&inputs);
        assert_eq!(intent.intent, Intent::Wait);
        assert_eq!(intent.gear, None);
        assert_eq!(intent.reason, "SpotSignal=WAIT");
        assert_eq!(intent.guards_evaluated, vec![GuardKind::SpotSignal]);
    }

    #[test]
    fn test_only_prev_close_failing() {
        let sig = signal(SignalState::EntryArmed);
        let mut inputs = passing(&sig);
        inputs.prev_close = 25100.0;

        let intent = ExecutionGate::default().route(&inputs);
        assert_eq!(intent.reason, "PrevClose filter blocked");
        assert_eq!(intent.guards_evaluated.len(), 3);
    }

    #[test]
    fn test_each_guard_reason() {
        let gate = ExecutionGate::default();
        let sig = signal(SignalState::EntryArmed);

        let mut inputs = passing(&sig);
        inputs.pending_ok = false;
        assert_eq!(gate.route(&inputs).reason, "PendingEntry not armed");

        let mut inputs = passing(&sig);
        inputs.future = inputs.spot + 50.5;
        assert_eq!(gate.route(&inputs).reason, "Spot-Fut basis exceeded");

        let mut inputs = passing(&sig);
        inputs.future = inputs.spot - 50.0;
        assert_eq!(gate.route(&inputs).intent, Intent::Execute);

        let mut inputs = passing(&sig);
        inputs.gear = Gear::NoTrade;
        assert_eq!(gate.route(&inputs).reason, "VIX gear unavailable");

        let mut inputs = passing(&sig);
        inputs.lots = 0;
        assert_eq!(gate.route(&inputs).reason, "VIX gear sized to zero lots");
    }

    #[test]
    fn test_nan_prices_fail_closed() {
        let sig = signal(SignalState::EntryArmed);
        let mut inputs = passing(&sig);
        inputs.future = f64::NAN;
        assert_eq!(
            ExecutionGate::default().route(&inputs).reason,
            "Spot-Fut basis exceeded"
        );
    }
}
