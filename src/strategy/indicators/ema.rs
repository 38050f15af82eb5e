//! Exponential moving average.
//!
//! `k = 2 / (period + 1)`, seeded with the first sample:
//! `ema[0] = x[0]`, `ema[t] = ema[t-1] + k * (x[t] - ema[t-1])`.

pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let Some(&first) = values.first() else {
        return out;
    };

    let k = 2.0 / (period.max(1) as f64 + 1.0);
    let mut prev = first;
    out.push(prev);
    for &x in &values[1..] {
        prev += k * (x - prev);
        out.push(prev);
    }
    out
}
