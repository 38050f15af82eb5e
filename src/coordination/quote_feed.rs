//! Quote Feed
//!
//! A background task refreshes last price and previous close for the spot
//! index, the volatility index and the near-month future into a lock-free
//! cache. The feed is the only writer; the decision loop reads
//! point-in-time snapshots and treats stale cells as missing.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::adapters::BrokerGateway;
use crate::domain::Quote;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteSlot {
    Spot,
    Vix,
    Future,
}

impl QuoteSlot {
    fn index(self) -> usize {
        match self {
            QuoteSlot::Spot => 0,
            QuoteSlot::Vix => 1,
            QuoteSlot::Future => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteSlot::Spot => "spot",
            QuoteSlot::Vix => "vix",
            QuoteSlot::Future => "future",
        }
    }
}

/// f64 values stored as bits; NaN marks an absent close
struct QuoteCell {
    last_price: AtomicU64,
    close: AtomicU64,
    updated_ms: AtomicI64,
}

impl QuoteCell {
    fn empty() -> Self {
        Self {
            last_price: AtomicU64::new(f64::NAN.to_bits()),
            close: AtomicU64::new(f64::NAN.to_bits()),
            updated_ms: AtomicI64::new(0),
        }
    }
}

pub struct QuoteCache {
    cells: [QuoteCell; 3],
}

impl Default for QuoteCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QuoteCache {
    pub fn new() -> Self {
        Self {
            cells: [QuoteCell::empty(), QuoteCell::empty(), QuoteCell::empty()],
        }
    }

    pub fn store(&self, slot: QuoteSlot, quote: Quote) {
        let cell = &self.cells[slot.index()];
        cell.last_price
            .store(quote.last_price.to_bits(), Ordering::Release);
        cell.close.store(
            quote.close.unwrap_or(f64::NAN).to_bits(),
            Ordering::Release,
        );
        cell.updated_ms
            .store(Utc::now().timestamp_millis(), Ordering::Release);
    }

    /// Latest quote if it is no older than `max_age`
    pub fn get(&self, slot: QuoteSlot, max_age: Duration) -> Option<Quote> {
        let cell = &self.cells[slot.index()];
        let updated_ms = cell.updated_ms.load(Ordering::Acquire);
        if updated_ms == 0 {
            return None;
        }
        let age_ms = Utc::now().timestamp_millis() - updated_ms;
        if age_ms > max_age.as_millis() as i64 {
            return None;
        }

        let last_price = f64::from_bits(cell.last_price.load(Ordering::Acquire));
        let close = f64::from_bits(cell.close.load(Ordering::Acquire));
        last_price.is_finite().then_some(Quote {
            last_price,
            close: close.is_finite().then_some(close),
        })
    }
}

/// One instrument the feed keeps fresh
#[derive(Debug, Clone)]
pub struct QuoteTarget {
    pub slot: QuoteSlot,
    pub exchange: String,
    pub token: String,
}

pub struct QuoteFeed {
    gateway: Arc<dyn BrokerGateway>,
    cache: Arc<QuoteCache>,
    targets: Vec<QuoteTarget>,
}

impl QuoteFeed {
    pub fn new(
        gateway: Arc<dyn BrokerGateway>,
        cache: Arc<QuoteCache>,
        targets: Vec<QuoteTarget>,
    ) -> Self {
        Self {
            gateway,
            cache,
            targets,
        }
    }

    /// Fetch every target once; returns how many were refreshed
    pub async fn refresh_once(&self) -> usize {
        let mut refreshed = 0;
        for target in &self.targets {
            match self
                .gateway
                .get_quote(&target.exchange, &target.token)
                .await
            {
                Ok(quote) => {
                    self.cache.store(target.slot, quote);
                    refreshed += 1;
                }
                Err(e) => warn!(
                    slot = target.slot.as_str(),
                    token = %target.token,
                    error = %e,
                    "quote refresh failed"
                ),
            }
        }
        refreshed
    }

    /// Refresh on `every` until shutdown is signalled
    pub fn spawn(self, every: Duration, mut shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(targets = self.targets.len(), ?every, "quote feed started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let refreshed = self.refresh_once().await;
                        debug!(refreshed, "quote feed tick");
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("quote feed stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockBrokerGateway;
    use crate::error::GearError;

    #[test]
    fn test_cache_roundtrip_and_staleness() {
        let cache = QuoteCache::new();
        assert!(cache.get(QuoteSlot::Spot, Duration::from_secs(5)).is_none());

        cache.store(
            QuoteSlot::Spot,
            Quote {
                last_price: 25100.5,
                close: None,
            },
        );
        let quote = cache.get(QuoteSlot::Spot, Duration::from_secs(5)).unwrap();
        assert_eq!(quote.last_price, 25100.5);
        assert_eq!(quote.close, None);
        assert!(cache.get(QuoteSlot::Future, Duration::from_secs(5)).is_none());
    }

    #[tokio::test]
    async fn test_refresh_keeps_going_past_failures() {
        let mut mock = MockBrokerGateway::new();
        mock.expect_get_quote().returning(|_, token| {
            if token == "26017" {
                Err(GearError::adapter("get_quote", "timeout"))
            } else {
                Ok(Quote {
                    last_price: 25000.0,
                    close: Some(24900.0),
                })
            }
        });

        let cache = Arc::new(QuoteCache::new());
        let feed = QuoteFeed::new(
            Arc::new(mock),
            cache.clone(),
            vec![
                QuoteTarget {
                    slot: QuoteSlot::Spot,
                    exchange: "NSE".into(),
                    token: "26000".into(),
                },
                QuoteTarget {
                    slot: QuoteSlot::Vix,
                    exchange: "NSE".into(),
                    token: "26017".into(),
                },
            ],
        );

        assert_eq!(feed.refresh_once().await, 1);
        let age = Duration::from_secs(30);
        assert_eq!(cache.get(QuoteSlot::Spot, age).map(|q| q.close), Some(Some(24900.0)));
        assert!(cache.get(QuoteSlot::Vix, age).is_none());
    }

    #[tokio::test]
    async fn test_feed_stops_on_shutdown() {
        let mut mock = MockBrokerGateway::new();
        mock.expect_get_quote().returning(|_, _| {
            Ok(Quote {
                last_price: 1.0,
                close: None,
            })
        });
        let feed = QuoteFeed::new(Arc::new(mock), Arc::new(QuoteCache::new()), Vec::new());

        let (tx, rx) = watch::channel(false);
        let handle = feed.spawn(Duration::from_millis(5), rx);
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
