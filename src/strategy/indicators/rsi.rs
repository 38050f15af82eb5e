//! Relative Strength Index, Wilder smoothing.
//!
//! Average gain/loss are seeded with the simple mean of the first `period`
//! deltas, then `avg = (avg * (period - 1) + x) / period`. RSI is 100 when
//! the average loss is zero. Values before the seed are NaN.

pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n <= period {
        return out;
    }

    let p = period as f64;
    let (mut gain_sum, mut loss_sum) = (0.0, 0.0);
    for i in 1..=period {
        let delta = closes[i] - closes[i - 1];
        if delta > 0.0 {
            gain_sum += delta;
        } else {
            loss_sum -= delta;
        }
    }
    let mut avg_gain = gain_sum / p;
    let mut avg_loss = loss_sum / p;
    out[period] = rsi_value(avg_gain, avg_loss);

    for i in (period + 1)..n {
        let delta = closes[i] - closes[i - 1];
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
        out[i] = rsi_value(avg_gain, avg_loss);
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_warmup_is_nan() {
        let out = rsi(&[1.0, 2.0, 3.0, 4.0], 3);
        assert!(out[..3].iter().all(|v| v.is_nan()));
        assert!(!out[3].is_nan());
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let out = rsi(&closes, 14);
        assert_eq!(out[29], 100.0);
    }

    #[test]
    fn test_rsi_wilder_seed_and_step() {
        // deltas: +2, -1, +1 -> seed gain 1.0, loss 1/3
        let out = rsi(&[10.0, 12.0, 11.0, 12.0, 11.0], 3);
        let seed = 100.0 - 100.0 / (1.0 + 3.0);
        assert!((out[3] - seed).abs() < 1e-9);

        // next delta -1: gain = 2/3, loss = (2/3 + 1)/3 = 5/9
        let rs = (2.0 / 3.0) / (5.0 / 9.0);
        let expected = 100.0 - 100.0 / (1.0 + rs);
        assert!((out[4] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_bounded() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + ((i * 7) % 11) as f64 - 5.0)
            .collect();
        for v in rsi(&closes, 14).into_iter().filter(|v| !v.is_nan()) {
            assert!((0.0..=100.0).contains(&v));
        }
    }
}
