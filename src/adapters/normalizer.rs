//! Strict parser for broker time-series and quote payloads.
//!
//! Accepts a bare array of rows or a `{"stat": "Ok", "values": [...]}`
//! wrapper. Prices arrive as numbers or numeric strings under the broker's
//! short keys (`into/inth/intl/intc`) or plain `open/high/low/close`. Rows
//! that fail any check are counted and skipped; a payload without a single
//! usable row is a contract violation, never a pack with a made-up close.

use chrono::{NaiveDateTime, TimeZone};
use chrono_tz::Asia::Kolkata;
use serde_json::Value;

use crate::domain::{Candle, CandleMeta, CandlePack, Quote};
use crate::error::{GearError, Result};

const OPEN_KEYS: &[&str] = &["into", "open", "o"];
const HIGH_KEYS: &[&str] = &["inth", "high", "h"];
const LOW_KEYS: &[&str] = &["intl", "low", "l"];
const CLOSE_KEYS: &[&str] = &["intc", "close", "c"];
const LAST_PRICE_KEYS: &[&str] = &["lp", "last_price", "ltp"];

/// Exchange-local timestamp format used in the `time` field
const BROKER_TIME_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

/// Numeric field that may be a JSON number or a numeric string
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn field(row: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| row.get(*k)).and_then(number)
}

/// Epoch seconds of a row: `ssboe`, then `epoch`, then IST `time`
pub fn row_epoch(row: &Value) -> Option<i64> {
    if let Some(epoch) = ["ssboe", "epoch"]
        .iter()
        .find_map(|k| row.get(*k))
        .and_then(number)
    {
        return Some(epoch as i64);
    }

    let text = row.get("time")?.as_str()?;
    let naive = NaiveDateTime::parse_from_str(text.trim(), BROKER_TIME_FORMAT).ok()?;
    Kolkata
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.timestamp())
}

fn parse_row(row: &Value) -> Option<Candle> {
    let candle = Candle {
        epoch: row_epoch(row)?,
        open: field(row, OPEN_KEYS)?,
        high: field(row, HIGH_KEYS)?,
        low: field(row, LOW_KEYS)?,
        close: field(row, CLOSE_KEYS)?,
    };

    let positive = [candle.open, candle.high, candle.low, candle.close]
        .iter()
        .all(|p| *p > 0.0);
    let ordered = candle.high >= candle.open.max(candle.close)
        && candle.low <= candle.open.min(candle.close);

    (positive && ordered).then_some(candle)
}

/// Rows of a series payload, whatever wrapper the broker used
fn series_rows(raw: &Value) -> Result<&Vec<Value>> {
    match raw {
        Value::Array(rows) => Ok(rows),
        Value::Object(obj) => {
            if let Some(stat) = obj.get("stat").and_then(Value::as_str) {
                if !stat.eq_ignore_ascii_case("ok") {
                    let emsg = obj
                        .get("emsg")
                        .and_then(Value::as_str)
                        .unwrap_or("no message");
                    return Err(GearError::contract(format!(
                        "broker returned stat={stat}: {emsg}"
                    )));
                }
            }
            obj.get("values")
                .and_then(Value::as_array)
                .ok_or_else(|| GearError::contract("series object has no values array"))
        }
        Value::Null => Err(GearError::contract("series payload is null")),
        other => Err(GearError::contract(format!(
            "unsupported series payload type: {}",
            type_name(other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Normalize a raw series payload into an ascending, de-duplicated pack
pub fn normalize_candles(raw: &Value, mut meta: CandleMeta) -> Result<CandlePack> {
    let rows = series_rows(raw)?;

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        match parse_row(row) {
            Some(candle) => candles.push(candle),
            None => meta.rejected_rows += 1,
        }
    }

    if candles.is_empty() {
        return Err(GearError::contract(format!(
            "no usable candle rows ({} received, {} rejected)",
            rows.len(),
            meta.rejected_rows
        )));
    }

    CandlePack::from_rows(candles, meta)
}

/// Previous session close of a quote payload, if it carries a usable one
pub fn quote_close(raw: &Value) -> Option<f64> {
    field(raw, CLOSE_KEYS).filter(|p| *p > 0.0)
}

/// Normalize a quote payload: last price is required, previous close optional
pub fn normalize_quote(raw: &Value) -> Result<Quote> {
    if let Some(stat) = raw.get("stat").and_then(Value::as_str) {
        if !stat.eq_ignore_ascii_case("ok") {
            return Err(GearError::contract(format!("quote stat={stat}")));
        }
    }

    let last_price = field(raw, LAST_PRICE_KEYS)
        .filter(|p| *p > 0.0)
        .ok_or_else(|| GearError::contract("quote has no usable last price"))?;
    Ok(Quote {
        last_price,
        close: quote_close(raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta() -> CandleMeta {
        CandleMeta {
            exchange: "NSE".into(),
            token: "26000".into(),
            interval: "1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_broker_rows_newest_first_are_sorted() {
        let raw = json!([
            {"ssboe": "1700000120", "into": "25010", "inth": "25020", "intl": "25000", "intc": "25015"},
            {"ssboe": "1700000060", "into": "25000", "inth": "25012", "intl": "24995", "intc": "25010"},
            {"ssboe": "1700000000", "into": "24990", "inth": "25005", "intl": "24985", "intc": "25000"}
        ]);
        let pack = normalize_candles(&raw, meta()).unwrap();

        assert_eq!(pack.len(), 3);
        assert_eq!(pack.rows[0].epoch, 1_700_000_000);
        assert_eq!(pack.close, 25015.0);
        assert_eq!(pack.last_bar_epoch, 1_700_000_120);
        assert_eq!(pack.meta.rejected_rows, 0);
    }

    #[test]
    fn test_dict_wrapper_and_numeric_values() {
        let raw = json!({
            "stat": "Ok",
            "values": [{"epoch": 60, "open": 10.0, "high": 11.0, "low": 9.5, "close": 10.5}]
        });
        let pack = normalize_candles(&raw, meta()).unwrap();
        assert_eq!(pack.close, 10.5);
    }

    #[test]
    fn test_time_field_is_exchange_local() {
        let raw = json!([{"time": "02-01-2024 09:15:00", "into": "1", "inth": "2", "intl": "1", "intc": "2"}]);
        let pack = normalize_candles(&raw, meta()).unwrap();
        // 09:15 IST == 03:45 UTC
        assert_eq!(pack.last_bar_epoch, 1_704_167_100);
    }

    #[test]
    fn test_garbage_rows_are_counted_and_skipped() {
        let raw = json!([
            {"ssboe": "120", "into": "10", "inth": "11", "intl": "9", "intc": "10.5"},
            {"ssboe": "60", "into": "10", "inth": "9", "intl": "8", "intc": "10"},
            {"ssboe": "0", "into": "abc", "inth": "11", "intl": "9", "intc": "10"},
            {"into": "10", "inth": "11", "intl": "9", "intc": "10"},
            {"ssboe": "180", "into": "0", "inth": "0", "intl": "0", "intc": "0"}
        ]);
        let pack = normalize_candles(&raw, meta()).unwrap();
        assert_eq!(pack.len(), 1);
        assert_eq!(pack.meta.rejected_rows, 4);
    }

    #[test]
    fn test_unusable_payloads_are_contract_violations() {
        for raw in [
            json!(null),
            json!([]),
            json!("oops"),
            json!({"stat": "Not_Ok", "emsg": "Session Expired"}),
            json!({"values": [{"ssboe": "1", "intc": null}]}),
        ] {
            let err = normalize_candles(&raw, meta()).unwrap_err();
            assert!(matches!(err, GearError::ContractViolation(_)), "{raw}");
        }

        let err = normalize_candles(&json!({"stat": "Not_Ok", "emsg": "Session Expired"}), meta())
            .unwrap_err();
        assert!(err.to_string().contains("Session Expired"));
    }

    #[test]
    fn test_quote_parsing() {
        let quote = normalize_quote(&json!({"stat": "Ok", "lp": "25100.35", "c": "25010.00"})).unwrap();
        assert_eq!(quote.last_price, 25100.35);
        assert_eq!(quote.close, Some(25010.0));

        let no_close = normalize_quote(&json!({"last_price": 14.2})).unwrap();
        assert_eq!(no_close.close, None);

        assert!(normalize_quote(&json!({"lp": "0"})).is_err());
    }
}
