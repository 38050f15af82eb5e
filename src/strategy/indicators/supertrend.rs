//! SuperTrend over ATR bands.
//!
//! Basic bands are `hl2 ± multiplier * atr`. The final upper band only moves
//! down unless the previous close broke above it; the final lower band only
//! moves up unless the previous close broke below it. Direction turns
//! bullish when the close crosses above the final upper band and bearish when
//! it crosses below the final lower band. The line follows the lower band
//! while bullish and the upper band while bearish.
//!
//! The first bar is seeded bearish with the line on the upper band.

use crate::domain::{Candle, TrendDirection};

use super::atr::atr;

#[derive(Debug, Clone, PartialEq)]
pub struct SuperTrendSeries {
    pub line: Vec<f64>,
    pub direction: Vec<TrendDirection>,
}

pub fn supertrend(bars: &[Candle], period: usize, multiplier: f64) -> SuperTrendSeries {
    let n = bars.len();
    let mut line = Vec::with_capacity(n);
    let mut direction = Vec::with_capacity(n);
    if n == 0 {
        return SuperTrendSeries { line, direction };
    }

    let atr = atr(bars, period);
    let hl2 = |i: usize| (bars[i].high + bars[i].low) / 2.0;

    let mut final_upper = hl2(0) + multiplier * atr[0];
    let mut final_lower = hl2(0) - multiplier * atr[0];
    let mut dir = TrendDirection::Bearish;
    line.push(final_upper);
    direction.push(dir);

    for i in 1..n {
        let basic_upper = hl2(i) + multiplier * atr[i];
        let basic_lower = hl2(i) - multiplier * atr[i];
        let prev_close = bars[i - 1].close;

        if basic_upper < final_upper || prev_close > final_upper {
            final_upper = basic_upper;
        }
        if basic_lower > final_lower || prev_close < final_lower {
            final_lower = basic_lower;
        }

        let close = bars[i].close;
        dir = match dir {
            TrendDirection::Bearish if close > final_upper => TrendDirection::Bullish,
            TrendDirection::Bullish if close < final_lower => TrendDirection::Bearish,
            unchanged => unchanged,
        };

        line.push(match dir {
            TrendDirection::Bullish => final_lower,
            TrendDirection::Bearish => final_upper,
        });
        direction.push(dir);
    }

    SuperTrendSeries { line, direction }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(data: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
        data.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Candle {
                epoch: i as i64 * 3600,
                open,
                high,
                low,
                close,
            })
            .collect()
    }

    #[test]
    fn test_first_bar_seeded_bearish_on_upper_band() {
        let st = supertrend(&bars(&[(100.0, 104.0, 96.0, 101.0)]), 3, 1.0);
        assert_eq!(st.direction, vec![TrendDirection::Bearish]);
        // hl2 100 + 1.0 * tr 8
        assert_eq!(st.line, vec![108.0]);
    }

    #[test]
    fn test_flips_bullish_when_close_breaks_upper_band() {
        let mut data = vec![(100.0, 101.0, 99.0, 100.0); 5];
        data.push((100.0, 130.0, 100.0, 129.0));
        let st = supertrend(&bars(&data), 3, 1.0);

        assert!(st.direction[..5].iter().all(|d| *d == TrendDirection::Bearish));
        assert_eq!(st.direction[5], TrendDirection::Bullish);
        assert!(st.line[5] < 129.0);
    }

    #[test]
    fn test_uptrend_line_below_close() {
        let data: Vec<_> = (0..25)
            .map(|i| {
                let base = 100.0 + i as f64 * 3.0;
                (base - 1.0, base + 2.0, base - 2.0, base + 1.5)
            })
            .collect();
        let b = bars(&data);
        let st = supertrend(&b, 5, 1.1);
        for i in 10..25 {
            assert_eq!(st.direction[i], TrendDirection::Bullish);
            assert!(st.line[i] < b[i].close);
        }
    }

    #[test]
    fn test_deterministic() {
        let data: Vec<_> = (0..40)
            .map(|i| {
                let base = 200.0 + ((i * 13) % 17) as f64;
                (base, base + 3.0, base - 3.0, base + 1.0)
            })
            .collect();
        let b = bars(&data);
        assert_eq!(supertrend(&b, 21, 1.1), supertrend(&b, 21, 1.1));
    }
}
