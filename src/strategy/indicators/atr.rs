//! Average True Range.
//!
//! True range is `max(h - l, |h - prev_close|, |l - prev_close|)`, `h - l` on
//! the first bar, smoothed with `alpha = 1 / period` and seeded with the
//! first true range.

use crate::domain::Candle;

pub fn true_range(bars: &[Candle]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let hl = bar.high - bar.low;
            if i == 0 {
                return hl;
            }
            let prev_close = bars[i - 1].close;
            hl.max((bar.high - prev_close).abs())
                .max((bar.low - prev_close).abs())
        })
        .collect()
}

pub fn atr(bars: &[Candle], period: usize) -> Vec<f64> {
    let tr = true_range(bars);
    let mut out = Vec::with_capacity(tr.len());
    let Some(&first) = tr.first() else {
        return out;
    };

    let alpha = 1.0 / period.max(1) as f64;
    let mut prev = first;
    out.push(prev);
    for &x in &tr[1..] {
        prev += alpha * (x - prev);
        out.push(prev);
    }
    out
}
