use chrono::Utc;

use crate::config::BasketConfig;
use crate::domain::{Gear, Instrument, LegSide, OrderBasket, OrderLeg};
use crate::error::{GearError, Result};

/// Leg template: side, instrument, strike offset from ATM, lots per sized lot
type LegTemplate = (LegSide, Instrument, Option<i64>, u32);

const SAFE_FUTURE: &[LegTemplate] = &[
    (LegSide::Buy, Instrument::Future, None, 1),
    (LegSide::Buy, Instrument::Put, Some(0), 1),
];

const RATIO_SPREAD: &[LegTemplate] = &[
    (LegSide::Buy, Instrument::Call, Some(200), 2),
    (LegSide::Sell, Instrument::Call, Some(-100), 1),
];

const BULL_CALL_SPREAD: &[LegTemplate] = &[
    (LegSide::Buy, Instrument::Call, Some(-100), 1),
    (LegSide::Sell, Instrument::Call, Some(200), 1),
];

/// Builds the multi-leg order template for a gear
#[derive(Debug, Clone)]
pub struct BasketBuilder {
    strike_step: i64,
    lot_size: u32,
}

impl Default for BasketBuilder {
    fn default() -> Self {
        Self::new(&BasketConfig::default())
    }
}

impl BasketBuilder {
    pub fn new(cfg: &BasketConfig) -> Self {
        Self {
            strike_step: cfg.strike_step.max(1),
            lot_size: cfg.lot_size,
        }
    }

    pub fn lot_size(&self) -> u32 {
        self.lot_size
    }

    /// Units marked for PnL: `lots * lot_size`
    pub fn position_quantity(&self, lots: u32) -> Result<u32> {
        lots.checked_mul(self.lot_size).ok_or_else(|| {
            GearError::contract(format!(
                "{lots} lots of {} overflows the position quantity",
                self.lot_size
            ))
        })
    }

    /// Spot rounded to the nearest strike step
    pub fn atm_strike(&self, spot: f64) -> Result<i64> {
        if !spot.is_finite() || spot <= 0.0 {
            return Err(GearError::contract(format!("invalid spot for ATM strike: {spot}")));
        }
        let step = self.strike_step as f64;
        Ok(((spot / step).round() * step) as i64)
    }

    pub fn build(&self, gear: Gear, spot: f64, lots: u32) -> Result<OrderBasket> {
        let (template, risk_note) = match gear {
            Gear::High => (SAFE_FUTURE, "Future + ATM Put hedge"),
            Gear::Low => (RATIO_SPREAD, "Low gear ratio call spread"),
            Gear::Medium => (BULL_CALL_SPREAD, "Defined-risk bull call spread"),
            Gear::NoTrade => {
                return Err(GearError::contract(format!(
                    "no order template for gear {gear}"
                )))
            }
        };
        if lots == 0 {
            return Err(GearError::contract(format!(
                "gear {gear} sized to zero lots"
            )));
        }

        let atm = self.atm_strike(spot)?;
        let legs = template
            .iter()
            .map(|&(side, instrument, offset, multiple)| {
                let qty_lots = multiple.checked_mul(lots).ok_or_else(|| {
                    GearError::contract(format!("{lots} lots overflows a {instrument:?} leg"))
                })?;
                Ok(OrderLeg {
                    side,
                    instrument,
                    strike_offset: offset,
                    strike: offset.map(|o| atm + o),
                    qty_lots,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(OrderBasket {
            gear,
            legs,
            lots,
            risk_note: risk_note.to_string(),
            ts: Utc::now(),
        })
    }
}
