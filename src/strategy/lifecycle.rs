use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::domain::{EntryContext, ExitBooking, LifecycleState, PositionSide, PositionState};
use crate::error::{GearError, Result};
use crate::persistence::Storage;

/// Owner of the persisted position state machine `FLAT -> ENTERED -> HOLDING -> FLAT`.
///
/// Every transition is written through before the in-memory state changes,
/// so a failed write means the transition did not happen. Calls that do not
/// apply to the current state are no-ops and return `false`.
pub struct PositionLifecycle {
    storage: Storage,
    state: PositionState,
}

impl PositionLifecycle {
    /// Load the persisted state, writing FLAT if none exists yet
    pub async fn load(storage: Storage) -> Result<Self> {
        let state = storage.load_or_init(PositionState::default).await?;
        if !state.is_consistent() {
            return Err(GearError::InvalidState(format!(
                "persisted position is inconsistent: state {} with entry fields {:?}/{:?}",
                state.state, state.position, state.entry_price
            )));
        }
        info!(
            state = %state.state,
            trade_count = state.trade_count,
            "position state loaded"
        );
        Ok(Self { storage, state })
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub async fn on_entry(
        &mut self,
        side: PositionSide,
        price: f64,
        entry: EntryContext,
    ) -> Result<bool> {
        if self.state.state != LifecycleState::Flat {
            debug!(state = %self.state.state, "entry ignored, position already open");
            return Ok(false);
        }

        let next = PositionState {
            state: LifecycleState::Entered,
            position: Some(side),
            entry_price: Some(price),
            entry_ts: Some(Utc::now()),
            trade_count: self.state.trade_count + 1,
            entry: Some(entry),
            last_exit: self.state.last_exit.clone(),
        };
        self.commit(next).await?;
        info!(price, trade_count = self.state.trade_count, "position entered");
        Ok(true)
    }

    pub async fn on_hold(&mut self) -> Result<bool> {
        if self.state.state != LifecycleState::Entered {
            return Ok(false);
        }

        let next = PositionState {
            state: LifecycleState::Holding,
            ..self.state.clone()
        };
        self.commit(next).await?;
        debug!("position holding");
        Ok(true)
    }

    /// Close the position, recording the realized result in the same write
    /// as the FLAT transition.
    pub async fn on_exit(&mut self, exit_price: f64, realized_delta: Decimal) -> Result<bool> {
        if !self.state.state.is_open() {
            return Ok(false);
        }

        let next = PositionState {
            trade_count: self.state.trade_count,
            last_exit: Some(ExitBooking {
                trade_count: self.state.trade_count,
                realized_delta,
                exit_price,
                ts: Utc::now(),
            }),
            ..PositionState::default()
        };
        self.commit(next).await?;
        info!(trade_count = self.state.trade_count, %realized_delta, "position closed");
        Ok(true)
    }

    async fn commit(&mut self, next: PositionState) -> Result<()> {
        debug_assert!(self.state.state.can_transition_to(next.state));
        self.storage.save(&next).await?;
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Gear, PositionKind};
    use crate::persistence::MemoryStore;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn context() -> EntryContext {
        EntryContext {
            gear: Gear::High,
            lots: 3,
            quantity: 195,
            kind: PositionKind::Options,
            atr_at_entry: 42.0,
        }
    }

    async fn lifecycle() -> (PositionLifecycle, MemoryStore, Storage) {
        let store = MemoryStore::new();
        let storage = Storage::new(Arc::new(store.clone()));
        let lc = PositionLifecycle::load(storage.clone()).await.unwrap();
        (lc, store, storage)
    }

    #[tokio::test]
    async fn test_full_cycle() {
        let (mut lc, _, storage) = lifecycle().await;

        assert!(lc.on_entry(PositionSide::Long, 25100.0, context()).await.unwrap());
        assert_eq!(lc.state().state, LifecycleState::Entered);
        assert_eq!(lc.state().trade_count, 1);

        assert!(lc.on_hold().await.unwrap());
        assert!(!lc.on_hold().await.unwrap());
        assert_eq!(lc.state().state, LifecycleState::Holding);

        assert!(lc.on_exit(25050.0, dec!(-9750)).await.unwrap());
        let state = lc.state().clone();
        assert!(state.is_flat());
        assert!(state.is_consistent());
        assert_eq!(state.trade_count, 1);
        let booking = state.last_exit.clone().unwrap();
        assert_eq!(booking.trade_count, 1);
        assert_eq!(booking.realized_delta, dec!(-9750));

        let persisted: PositionState = storage.load().await.unwrap().unwrap();
        assert_eq!(persisted, state);
    }

    #[tokio::test]
    async fn test_second_entry_is_noop() {
        let (mut lc, _, _) = lifecycle().await;
        lc.on_entry(PositionSide::Long, 25100.0, context()).await.unwrap();
        let first = lc.state().clone();

        assert!(!lc.on_entry(PositionSide::Long, 25500.0, context()).await.unwrap());
        assert_eq!(lc.state(), &first);
    }

    #[tokio::test]
    async fn test_exit_and_hold_when_flat_are_noops() {
        let (mut lc, _, _) = lifecycle().await;
        assert!(!lc.on_exit(25000.0, dec!(0)).await.unwrap());
        assert!(!lc.on_hold().await.unwrap());
        assert_eq!(lc.state(), &PositionState::default());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_unchanged() {
        let (mut lc, store, _) = lifecycle().await;
        store.set_fail_writes(true);

        assert!(lc.on_entry(PositionSide::Long, 25100.0, context()).await.is_err());
        assert!(lc.state().is_flat());
        assert_eq!(lc.state().trade_count, 0);
    }

    #[tokio::test]
    async fn test_next_entry_keeps_previous_exit_record() {
        let (mut lc, _, _) = lifecycle().await;
        lc.on_entry(PositionSide::Long, 25100.0, context()).await.unwrap();
        lc.on_exit(25200.0, dec!(19500)).await.unwrap();
        lc.on_entry(PositionSide::Long, 25300.0, context()).await.unwrap();

        let state = lc.state();
        assert_eq!(state.trade_count, 2);
        assert_eq!(state.last_exit.as_ref().map(|b| b.trade_count), Some(1));
        assert!(state.is_consistent());
    }

    #[tokio::test]
    async fn test_reload_resumes_open_position() {
        let (mut lc, store, _) = lifecycle().await;
        lc.on_entry(PositionSide::Long, 25100.0, context()).await.unwrap();

        let reloaded = PositionLifecycle::load(Storage::new(Arc::new(store)))
            .await
            .unwrap();
        assert_eq!(reloaded.state(), lc.state());
    }
}
