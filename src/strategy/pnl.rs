use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::domain::{EquityPoint, ExitBooking, PnLState};
use crate::error::{GearError, Result};
use crate::persistence::{journals, Storage};

/// f64 price to money, rejecting non-finite values
pub fn to_money(value: f64) -> Result<Decimal> {
    Decimal::try_from(value)
        .map(|d| d.round_dp(4))
        .map_err(|_| GearError::contract(format!("price {value} is not representable")))
}

/// `(exit - entry) * qty - friction`
pub fn realized_delta(entry: f64, exit: f64, qty: u32, friction: Decimal) -> Result<Decimal> {
    Ok((to_money(exit)? - to_money(entry)?) * Decimal::from(qty) - friction)
}

/// Realized/unrealized tracking with a full overwrite of `pnl_state` and one
/// equity-curve line per update.
///
/// The snapshot is the source of truth. Curve points that fail to append are
/// held and retried on the next update, and a curve that ends behind the
/// snapshot is topped up on load.
pub struct PnLEngine {
    storage: Storage,
    state: PnLState,
    unjournaled: Vec<EquityPoint>,
}

impl PnLEngine {
    pub async fn load(storage: Storage) -> Result<Self> {
        let state = storage.load_or_init(PnLState::default).await?;
        let curve: Vec<EquityPoint> = storage.read_journal(journals::EQUITY_CURVE).await?;
        let behind = match curve.last() {
            Some(last) => last.ts != state.ts || last.equity != state.equity,
            None => !state.equity.is_zero(),
        };

        let mut engine = Self {
            storage,
            state,
            unjournaled: Vec::new(),
        };
        if behind {
            warn!(equity = %engine.state.equity, "equity curve behind pnl snapshot, appending");
            engine.unjournaled.push(engine.point());
            engine.flush_curve().await;
        }
        Ok(engine)
    }

    pub fn state(&self) -> &PnLState {
        &self.state
    }

    /// Points still waiting to be appended to the equity curve
    pub fn unjournaled(&self) -> usize {
        self.unjournaled.len()
    }

    /// Mark the open position: `unrealized = (current - entry) * qty`
    pub async fn on_tick(&mut self, entry: f64, current: f64, qty: u32) -> Result<&PnLState> {
        let unrealized = (to_money(current)? - to_money(entry)?) * Decimal::from(qty);
        let next = PnLState {
            realized: self.state.realized,
            unrealized,
            equity: self.state.realized + unrealized,
            ts: Utc::now(),
            booked_trade_count: self.state.booked_trade_count,
        };
        self.commit(next).await?;
        Ok(&self.state)
    }

    /// Book a closed trade and zero the open MTM
    pub async fn on_exit(&mut self, realized_delta: Decimal) -> Result<&PnLState> {
        self.close(realized_delta, self.state.booked_trade_count)
            .await?;
        Ok(&self.state)
    }

    /// Book the exit the lifecycle recorded. Exits at or below
    /// `booked_trade_count` are already in `realized` and return `false`.
    pub async fn book_exit(&mut self, booking: &ExitBooking) -> Result<bool> {
        if booking.trade_count <= self.state.booked_trade_count {
            debug!(trade_count = booking.trade_count, "exit already booked");
            return Ok(false);
        }
        self.close(booking.realized_delta, booking.trade_count)
            .await?;
        info!(
            trade_count = booking.trade_count,
            realized_delta = %booking.realized_delta,
            realized = %self.state.realized,
            "exit booked"
        );
        Ok(true)
    }

    pub async fn equity_curve(&self) -> Result<Vec<EquityPoint>> {
        self.storage.read_journal(journals::EQUITY_CURVE).await
    }

    async fn close(&mut self, realized_delta: Decimal, booked_trade_count: u64) -> Result<()> {
        let realized = self.state.realized + realized_delta;
        let next = PnLState {
            realized,
            unrealized: Decimal::ZERO,
            equity: realized,
            ts: Utc::now(),
            booked_trade_count,
        };
        self.commit(next).await
    }

    fn point(&self) -> EquityPoint {
        EquityPoint {
            ts: self.state.ts,
            equity: self.state.equity,
        }
    }

    async fn commit(&mut self, next: PnLState) -> Result<()> {
        self.storage.save(&next).await?;
        self.state = next;

        self.unjournaled.push(self.point());
        self.flush_curve().await;
        debug!(
            realized = %self.state.realized,
            unrealized = %self.state.unrealized,
            equity = %self.state.equity,
            "pnl updated"
        );
        Ok(())
    }

    /// Append held points oldest first, stopping at the first failure
    async fn flush_curve(&mut self) {
        while let Some(point) = self.unjournaled.first() {
            if let Err(e) = self.storage.append(journals::EQUITY_CURVE, point).await {
                warn!(
                    error = %e,
                    behind = self.unjournaled.len(),
                    "equity curve append failed, retrying on next update"
                );
                return;
            }
            self.unjournaled.remove(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn engine() -> (PnLEngine, Storage) {
        let storage = Storage::new(Arc::new(MemoryStore::new()));
        (PnLEngine::load(storage.clone()).await.unwrap(), storage)
    }

    fn booking(trade_count: u64, realized_delta: Decimal) -> ExitBooking {
        ExitBooking {
            trade_count,
            realized_delta,
            exit_price: 24680.0,
            ts: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_tick_then_exit() {
        let (mut pnl, storage) = engine().await;

        let after_tick = pnl.on_tick(25000.0, 25080.0, 1).await.unwrap().clone();
        assert_eq!(after_tick.unrealized, dec!(80));
        assert_eq!(after_tick.equity, dec!(80));

        let after_exit = pnl.on_exit(dec!(80)).await.unwrap().clone();
        assert_eq!(after_exit.realized, dec!(80));
        assert_eq!(after_exit.unrealized, dec!(0));
        assert_eq!(after_exit.equity, dec!(80));

        let persisted: PnLState = storage.load().await.unwrap().unwrap();
        assert_eq!(persisted, after_exit);

        let curve = pnl.equity_curve().await.unwrap();
        assert_eq!(curve.len(), 2);
        assert_eq!(curve.last().map(|p| p.equity), Some(dec!(80)));
    }

    #[tokio::test]
    async fn test_equity_is_realized_plus_unrealized() {
        let (mut pnl, _) = engine().await;
        pnl.on_exit(dec!(-120.5)).await.unwrap();
        let state = pnl.on_tick(25000.0, 24990.25, 65).await.unwrap();

        assert_eq!(state.unrealized, dec!(-633.75));
        assert_eq!(state.equity, state.realized + state.unrealized);
    }

    #[tokio::test]
    async fn test_exit_is_booked_once_per_trade() {
        let (mut pnl, storage) = engine().await;
        pnl.on_tick(25000.0, 24660.0, 195).await.unwrap();

        assert!(pnl.book_exit(&booking(1, dec!(-66300))).await.unwrap());
        assert!(!pnl.book_exit(&booking(1, dec!(-66300))).await.unwrap());

        let state: PnLState = storage.load().await.unwrap().unwrap();
        assert_eq!(state.realized, dec!(-66300));
        assert_eq!(state.unrealized, dec!(0));
        assert_eq!(state.booked_trade_count, 1);
    }

    #[tokio::test]
    async fn test_failed_exit_write_keeps_trade_unbooked() {
        let store = MemoryStore::new();
        let mut pnl = PnLEngine::load(Storage::new(Arc::new(store.clone())))
            .await
            .unwrap();

        store.set_fail_writes(true);
        assert!(pnl.book_exit(&booking(1, dec!(500))).await.is_err());
        assert_eq!(pnl.state().booked_trade_count, 0);
        assert_eq!(pnl.state().realized, dec!(0));

        store.set_fail_writes(false);
        assert!(pnl.book_exit(&booking(1, dec!(500))).await.unwrap());
        assert_eq!(pnl.state().realized, dec!(500));
    }

    #[tokio::test]
    async fn test_missed_curve_points_are_appended_later() {
        let store = MemoryStore::new();
        let storage = Storage::new(Arc::new(store.clone()));
        let mut pnl = PnLEngine::load(storage.clone()).await.unwrap();

        store.set_fail_appends(true);
        pnl.on_tick(25000.0, 25010.0, 10).await.unwrap();
        assert_eq!(pnl.unjournaled(), 1);
        assert!(pnl.equity_curve().await.unwrap().is_empty());

        store.set_fail_appends(false);
        pnl.on_tick(25000.0, 25020.0, 10).await.unwrap();
        assert_eq!(pnl.unjournaled(), 0);
        let equities: Vec<Decimal> = pnl
            .equity_curve()
            .await
            .unwrap()
            .iter()
            .map(|p| p.equity)
            .collect();
        assert_eq!(equities, vec![dec!(100), dec!(200)]);
    }

    #[tokio::test]
    async fn test_load_tops_up_a_curve_behind_the_snapshot() {
        let store = MemoryStore::new();
        let storage = Storage::new(Arc::new(store.clone()));
        {
            let mut pnl = PnLEngine::load(storage.clone()).await.unwrap();
            store.set_fail_appends(true);
            pnl.on_exit(dec!(-75)).await.unwrap();
        }
        store.set_fail_appends(false);

        let pnl = PnLEngine::load(storage).await.unwrap();
        let curve = pnl.equity_curve().await.unwrap();
        assert_eq!(curve.len(), 1);
        assert_eq!(curve[0].equity, pnl.state().equity);
        assert_eq!(curve[0].ts, pnl.state().ts);

        // A curve already in step is left alone
        let again = PnLEngine::load(Storage::new(Arc::new(store))).await.unwrap();
        assert_eq!(again.equity_curve().await.unwrap().len(), 1);
    }

    #[test]
    fn test_realized_delta_with_friction() {
        let delta = realized_delta(25000.0, 25100.0, 130, dec!(40)).unwrap();
        assert_eq!(delta, dec!(12960));
        assert!(to_money(f64::NAN).is_err());
    }
}
