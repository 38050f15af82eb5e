//! Minute bars to hourly bars.
//!
//! Buckets are `floor((epoch - offset) / 3600)`; each hourly bar takes the
//! first open, highest high, lowest low and last close of its bucket and is
//! stamped with the bucket start. A bucket only counts once it is closed,
//! i.e. the newest source row reaches its end.

use crate::domain::Candle;

const HOUR_SECS: i64 = 3600;

/// Start epoch of the hourly bucket containing `epoch`
pub fn bucket_start(epoch: i64, offset_secs: i64) -> i64 {
    (epoch - offset_secs).div_euclid(HOUR_SECS) * HOUR_SECS + offset_secs
}

/// Aggregate ascending source rows into hourly bars, all buckets included.
pub fn resample_hourly(rows: &[Candle], offset_secs: i64) -> Vec<Candle> {
    let mut out: Vec<Candle> = Vec::new();
    for row in rows {
        let start = bucket_start(row.epoch, offset_secs);
        match out.last_mut() {
            Some(bar) if bar.epoch == start => {
                bar.high = bar.high.max(row.high);
                bar.low = bar.low.min(row.low);
                bar.close = row.close;
            }
            _ => out.push(Candle {
                epoch: start,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
            }),
        }
    }
    out
}

/// Hourly bars whose bucket has closed. `source_interval_secs` is the span of
/// one source row, so a row stamped at `t` covers up to `t + interval`.
pub fn closed_hourly_bars(
    rows: &[Candle],
    offset_secs: i64,
    source_interval_secs: i64,
) -> Vec<Candle> {
    let mut bars = resample_hourly(rows, offset_secs);
    if let (Some(newest), Some(last)) = (rows.last(), bars.last()) {
        if newest.epoch + source_interval_secs < last.epoch + HOUR_SECS {
            bars.pop();
        }
    }
    bars
}
