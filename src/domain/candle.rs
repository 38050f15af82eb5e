use serde::{Deserialize, Serialize};

use crate::error::{GearError, Result};

/// One OHLC bar, stamped with its open time in epoch seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub epoch: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Where a pack came from and how much of the payload was usable
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandleMeta {
    pub exchange: String,
    pub token: String,
    pub interval: String,
    pub rows: usize,
    pub rejected_rows: usize,
}

/// Normalized candle series, oldest first.
///
/// A pack can only be built from at least one row, so `close` and
/// `last_bar_epoch` are always those of the newest row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandlePack {
    pub close: f64,
    pub last_bar_epoch: i64,
    pub rows: Vec<Candle>,
    pub meta: CandleMeta,
}

impl CandlePack {
    /// Sort ascending by epoch, drop duplicate epochs (first occurrence wins)
    /// and take close/last epoch from the newest row.
    pub fn from_rows(mut rows: Vec<Candle>, mut meta: CandleMeta) -> Result<Self> {
        rows.sort_by_key(|c| c.epoch);
        rows.dedup_by_key(|c| c.epoch);

        let newest = rows
            .last()
            .copied()
            .ok_or_else(|| GearError::contract("candle series has no usable rows"))?;

        meta.rows = rows.len();
        Ok(Self {
            close: newest.close,
            last_bar_epoch: newest.epoch,
            rows,
            meta,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
