use rust_decimal::Decimal;
use tracing::warn;

use crate::config::RiskConfig;
use crate::domain::{PositionKind, PositionState, RiskDecision};

/// Route-1 intrabar risk check for an open position
#[derive(Debug, Clone)]
pub struct RiskGovernor {
    capital: Decimal,
    max_loss_fraction: Decimal,
    atr_stop_multiplier: f64,
}

impl Default for RiskGovernor {
    fn default() -> Self {
        Self::new(&RiskConfig::default())
    }
}

impl RiskGovernor {
    pub fn new(config: &RiskConfig) -> Self {
        Self {
            capital: config.capital,
            max_loss_fraction: config.max_loss_fraction,
            atr_stop_multiplier: config.atr_stop_multiplier,
        }
    }

    /// Largest tolerated MTM loss for options positions
    pub fn max_loss(&self) -> Decimal {
        self.max_loss_fraction * self.capital
    }

    /// Options positions exit on an MTM loss beyond the capital fraction;
    /// pure futures exit once price falls to the ATR stop below entry.
    pub fn evaluate(&self, position: &PositionState, price: f64, mtm: Decimal) -> RiskDecision {
        let Some(entry_price) = position.entry_price else {
            return RiskDecision::hold("No open position");
        };

        let kind = position
            .entry
            .as_ref()
            .map_or(PositionKind::Options, |e| e.kind);

        match kind {
            PositionKind::Options => {
                let limit = self.max_loss();
                if mtm < Decimal::ZERO && mtm.abs() > limit {
                    warn!(%mtm, %limit, "options MTM loss beyond limit");
                    return RiskDecision::exit(format!(
                        "Options MTM loss {} > {} of capital",
                        mtm.abs(),
                        self.max_loss_fraction
                    ));
                }
            }
            PositionKind::Future => {
                let atr = position.entry.as_ref().map_or(0.0, |e| e.atr_at_entry);
                let stop = entry_price - self.atr_stop_multiplier * atr;
                if price <= stop {
                    warn!(price, stop, "futures ATR stop hit");
                    return RiskDecision::exit(format!(
                        "FUT price {price:.2} hit ATR stop {stop:.2}"
                    ));
                }
            }
        }

        RiskDecision::hold("Risk within limits")
    }
}
