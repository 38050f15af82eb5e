use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::config::GearConfig;
use crate::domain::{Gear, VixGearContext};

/// Maps a volatility index reading to a gear and sizes it in lots.
#[derive(Debug, Clone)]
pub struct VixGearSelector {
    high_below: f64,
    medium_below: f64,
    no_trade_upto: f64,
    reference_capital: Decimal,
}

impl Default for VixGearSelector {
    fn default() -> Self {
        Self::new(&GearConfig::default())
    }
}

impl VixGearSelector {
    pub fn new(cfg: &GearConfig) -> Self {
        Self {
            high_below: cfg.high_below,
            medium_below: cfg.medium_below,
            no_trade_upto: cfg.no_trade_upto,
            reference_capital: cfg.reference_capital,
        }
    }

    /// Pure and total over every f64
    pub fn select(&self, vix: f64) -> VixGearContext {
        let (gear, reason) = if !vix.is_finite() || vix < 0.0 {
            (Gear::NoTrade, format!("VIX {vix} is not a valid reading"))
        } else if vix < self.high_below {
            (
                Gear::High,
                format!("VIX {vix} < {} -> aggressive", self.high_below),
            )
        } else if vix < self.medium_below {
            (
                Gear::Medium,
                format!(
                    "VIX {vix} in [{}, {}) -> medium",
                    self.high_below, self.medium_below
                ),
            )
        } else if vix <= self.no_trade_upto {
            (
                Gear::NoTrade,
                format!(
                    "VIX {vix} in [{}, {}] -> no trade",
                    self.medium_below, self.no_trade_upto
                ),
            )
        } else {
            (
                Gear::Low,
                format!("VIX {vix} > {} -> defensive", self.no_trade_upto),
            )
        };

        VixGearContext {
            vix,
            gear,
            reason,
            ts: Utc::now(),
        }
    }

    /// `round(capital / reference * multiplier)`, half to even, never negative.
    pub fn size_lots(&self, gear: Gear, capital: Decimal) -> u32 {
        let multiplier = gear.multiplier();
        if multiplier == 0 || capital <= Decimal::ZERO || self.reference_capital <= Decimal::ZERO
        {
            return 0;
        }

        let raw = capital / self.reference_capital * Decimal::from(multiplier);
        raw.round().to_u32().unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_vix_bands() {
        let sel = VixGearSelector::default();
        assert_eq!(sel.select(12.0).gear, Gear::High);
        assert_eq!(sel.select(15.0).gear, Gear::Medium);
        assert_eq!(sel.select(17.0).gear, Gear::NoTrade);
        assert_eq!(sel.select(20.0).gear, Gear::Low);
    }

    #[test]
    fn test_band_edges() {
        let sel = VixGearSelector::default();
        assert_eq!(sel.select(14.0).gear, Gear::Medium);
        assert_eq!(sel.select(16.0).gear, Gear::NoTrade);
        assert_eq!(sel.select(18.0).gear, Gear::NoTrade);
        assert_eq!(sel.select(18.01).gear, Gear::Low);
    }

    #[test]
    fn test_invalid_readings_do_not_trade() {
        let sel = VixGearSelector::default();
        assert_eq!(sel.select(f64::NAN).gear, Gear::NoTrade);
        assert_eq!(sel.select(f64::INFINITY).gear, Gear::NoTrade);
        assert_eq!(sel.select(-1.0).gear, Gear::NoTrade);
    }

    #[test]
    fn test_lot_sizing() {
        let sel = VixGearSelector::default();
        let capital = dec!(625000);
        assert_eq!(sel.size_lots(Gear::High, capital), 3);
        assert_eq!(sel.size_lots(Gear::Medium, capital), 2);
        assert_eq!(sel.size_lots(Gear::Low, capital), 1);
        assert_eq!(sel.size_lots(Gear::NoTrade, capital), 0);
        assert_eq!(sel.size_lots(Gear::Low, dec!(-100)), 0);
    }

    #[test]
    fn test_lot_rounding_is_half_even() {
        let sel = VixGearSelector::default();
        // 0.5 -> 0, 1.5 -> 2, 2.5 -> 2
        assert_eq!(sel.size_lots(Gear::Low, dec!(312500)), 0);
        assert_eq!(sel.size_lots(Gear::Low, dec!(937500)), 2);
        assert_eq!(sel.size_lots(Gear::Low, dec!(1562500)), 2);
    }

    #[test]
    fn test_lots_monotonic_in_capital() {
        let sel = VixGearSelector::default();
        for gear in [Gear::Low, Gear::Medium, Gear::High] {
            let mut last = 0;
            for step in 0..200 {
                let lots = sel.size_lots(gear, Decimal::from(step * 25_000));
                assert!(lots >= last);
                last = lots;
            }
        }
    }
}
