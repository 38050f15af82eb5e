//! File-backed broker for paper trading and deterministic replay.
//!
//! Layout under the replay directory:
//! - `candles_<exchange>_<token>.json`: raw series payload in broker shape
//! - `quotes.json`: `{ "<token>": { "lp": .., "c": .. } }`
//! - `instruments.json`: `[ { "exchange", "symbol", "token" } ]`
//!
//! A cursor limits what is visible: candles stamped after the cursor are
//! hidden, and a token with a candle file quotes the close of its newest
//! visible row as last price. Without a cursor everything is visible.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::debug;

use super::broker::BrokerGateway;
use super::normalizer::{normalize_quote, quote_close, row_epoch};
use crate::domain::{InstrumentRef, Quote};
use crate::error::{GearError, Result};

const NO_CURSOR: i64 = i64::MAX;

pub struct ReplayGateway {
    dir: PathBuf,
    cursor: AtomicI64,
}

impl ReplayGateway {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cursor: AtomicI64::new(NO_CURSOR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Hide data stamped after `epoch`
    pub fn set_cursor(&self, epoch: i64) {
        self.cursor.store(epoch, Ordering::SeqCst);
    }

    pub fn cursor(&self) -> Option<i64> {
        match self.cursor.load(Ordering::SeqCst) {
            NO_CURSOR => None,
            c => Some(c),
        }
    }

    fn candles_path(&self, exchange: &str, token: &str) -> PathBuf {
        self.dir.join(format!("candles_{exchange}_{token}.json"))
    }

    async fn read_json(&self, path: &Path) -> Result<Option<Value>> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(GearError::adapter(
                "replay_read",
                format!("{}: {e}", path.display()),
            )),
        }
    }

    /// Rows of a candle file visible at the cursor, in file order
    async fn visible_rows(&self, exchange: &str, token: &str) -> Result<Option<Vec<Value>>> {
        let Some(raw) = self.read_json(&self.candles_path(exchange, token)).await? else {
            return Ok(None);
        };
        let rows = match raw {
            Value::Array(rows) => rows,
            Value::Object(mut obj) => match obj.remove("values") {
                Some(Value::Array(rows)) => rows,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };

        let cursor = self.cursor.load(Ordering::SeqCst);
        Ok(Some(
            rows.into_iter()
                .filter(|row| row_epoch(row).map_or(true, |e| e <= cursor))
                .collect(),
        ))
    }
}

#[async_trait]
impl BrokerGateway for ReplayGateway {
    async fn login(&self) -> Result<bool> {
        if tokio::fs::metadata(&self.dir).await.is_err() {
            return Err(GearError::adapter_fatal(
                "login",
                format!("replay directory {} not found", self.dir.display()),
            ));
        }
        debug!(dir = %self.dir.display(), "replay session opened");
        Ok(true)
    }

    async fn get_quote(&self, exchange: &str, token: &str) -> Result<Quote> {
        let static_quote = self
            .read_json(&self.dir.join("quotes.json"))
            .await?
            .and_then(|mut quotes| quotes.get_mut(token).map(Value::take));
        let prev_close = static_quote.as_ref().and_then(quote_close);

        if let Some(rows) = self.visible_rows(exchange, token).await? {
            let newest = rows
                .iter()
                .filter_map(|row| row_epoch(row).map(|e| (e, row)))
                .max_by_key(|(e, _)| *e)
                .map(|(_, row)| row);
            if let Some(row) = newest {
                let mut quote = normalize_quote(&serde_json::json!({
                    "lp": row.get("intc").or_else(|| row.get("close")).cloned().unwrap_or(Value::Null),
                }))?;
                quote.close = prev_close;
                return Ok(quote);
            }
        }

        match static_quote {
            Some(q) => normalize_quote(&q),
            None => Err(GearError::adapter(
                "get_quote",
                format!("no replay quote for {exchange}:{token}"),
            )),
        }
    }

    async fn get_candles(
        &self,
        exchange: &str,
        token: &str,
        _interval_mins: u32,
        start: i64,
        end: i64,
    ) -> Result<Value> {
        let rows = self.visible_rows(exchange, token).await?.ok_or_else(|| {
            GearError::adapter(
                "get_candles",
                format!("no replay candles for {exchange}:{token}"),
            )
        })?;

        let rows: Vec<Value> = rows
            .into_iter()
            .filter(|row| row_epoch(row).map_or(true, |e| e >= start && e <= end))
            .collect();
        Ok(Value::Array(rows))
    }

    async fn resolve_instrument(&self, exchange: &str, search_text: &str) -> Result<InstrumentRef> {
        let listed: Vec<InstrumentRef> = match self.read_json(&self.dir.join("instruments.json")).await? {
            Some(raw) => serde_json::from_value(raw)?,
            None => Vec::new(),
        };

        let needle = search_text.to_uppercase();
        listed
            .into_iter()
            .filter(|i| i.exchange.eq_ignore_ascii_case(exchange))
            .filter(|i| i.symbol.to_uppercase().starts_with(&needle))
            // futures symbols end with F
            .find(|i| i.symbol.ends_with('F'))
            .ok_or_else(|| {
                GearError::adapter_fatal(
                    "resolve_instrument",
                    format!("no future matching {search_text} on {exchange}"),
                )
            })
    }
}
