//! Technical indicators over hourly bars.
//!
//! Every function is pure over its input slice, so identical bars always give
//! bit-identical output.

pub mod atr;
pub mod ema;
pub mod resample;
pub mod rsi;
pub mod supertrend;

pub use atr::{atr, true_range};
pub use ema::ema;
pub use resample::{bucket_start, closed_hourly_bars, resample_hourly};
pub use rsi::rsi;
pub use supertrend::{supertrend, SuperTrendSeries};

use crate::config::StrategyConfig;
use crate::domain::{Candle, IndicatorSnapshot};
use crate::error::{GearError, Result};

/// Indicator periods and SuperTrend multiplier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorParams {
    pub ema_period: usize,
    pub rsi_period: usize,
    pub atr_period: usize,
    pub supertrend_period: usize,
    pub supertrend_multiplier: f64,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self::from(&StrategyConfig::default())
    }
}

impl From<&StrategyConfig> for IndicatorParams {
    fn from(cfg: &StrategyConfig) -> Self {
        Self {
            ema_period: cfg.ema_period,
            rsi_period: cfg.rsi_period,
            atr_period: cfg.atr_period,
            supertrend_period: cfg.supertrend_period,
            supertrend_multiplier: cfg.supertrend_multiplier,
        }
    }
}

impl IndicatorParams {
    /// Fewest bars that give a defined RSI and a previous SuperTrend direction
    pub fn min_bars(&self) -> usize {
        (self.rsi_period + 1).max(2)
    }
}

/// Indicator values on the newest bar of `bars` (ascending, closed bars only)
pub fn compute_snapshot(bars: &[Candle], params: &IndicatorParams) -> Result<IndicatorSnapshot> {
    let needed = params.min_bars();
    if bars.len() < needed {
        return Err(GearError::contract(format!(
            "insufficient bars: have {}, need {}",
            bars.len(),
            needed
        )));
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let last = bars.len() - 1;

    let ema_series = ema(&closes, params.ema_period);
    let rsi_series = rsi(&closes, params.rsi_period);
    let atr_series = atr(bars, params.atr_period);
    let st = supertrend(bars, params.supertrend_period, params.supertrend_multiplier);

    let snapshot = IndicatorSnapshot {
        bar_epoch: bars[last].epoch,
        close: closes[last],
        ema: ema_series[last],
        rsi: rsi_series[last],
        atr: atr_series[last],
        supertrend: st.line[last],
        direction: st.direction[last],
        prev_direction: Some(st.direction[last - 1]),
        bars: bars.len(),
    };

    let values = [
        snapshot.close,
        snapshot.ema,
        snapshot.rsi,
        snapshot.atr,
        snapshot.supertrend,
    ];
    if values.iter().any(|v| !v.is_finite()) {
        return Err(GearError::contract(format!(
            "non-finite indicator value on bar {}",
            snapshot.bar_epoch
        )));
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TrendDirection;

    fn trending_bars(n: usize, step: f64) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let base = 25000.0 + i as f64 * step;
                Candle {
                    epoch: i as i64 * 3600,
                    open: base - 5.0,
                    high: base + 20.0,
                    low: base - 20.0,
                    close: base + 5.0,
                }
            })
            .collect()
    }

    #[test]
    fn test_insufficient_bars_is_contract_violation() {
        let err = compute_snapshot(&trending_bars(19, 10.0), &IndicatorParams::default())
            .unwrap_err();
        assert!(matches!(err, GearError::ContractViolation(ref m) if m.contains("insufficient")));
    }

    #[test]
    fn test_snapshot_on_newest_bar() {
        let bars = trending_bars(60, 15.0);
        let snap = compute_snapshot(&bars, &IndicatorParams::default()).unwrap();

        assert_eq!(snap.bar_epoch, 59 * 3600);
        assert_eq!(snap.close, bars[59].close);
        assert_eq!(snap.direction, TrendDirection::Bullish);
        assert_eq!(snap.prev_direction, Some(TrendDirection::Bullish));
        assert!(snap.ema < snap.close);
        assert!(snap.rsi > 50.0);
        assert_eq!(snap.bars, 60);
    }

    #[test]
    fn test_snapshot_is_deterministic() {
        let bars = trending_bars(80, -7.5);
        let params = IndicatorParams::default();
        assert_eq!(
            compute_snapshot(&bars, &params).unwrap(),
            compute_snapshot(&bars, &params).unwrap()
        );
    }
}
