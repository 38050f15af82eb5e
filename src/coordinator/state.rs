//! Status report assembled from the persisted snapshots

use serde::{Deserialize, Serialize};

use crate::domain::{
    ExecutionSnapshot, PnLState, PositionState, SignalStateSnapshot, VixGearState,
};
use crate::error::Result;
use crate::persistence::{EventLog, EventRecord, Storage};

/// Everything the `status` command prints. Missing documents stay `None`
/// so a fresh state directory reads cleanly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusReport {
    pub position: Option<PositionState>,
    pub pnl: Option<PnLState>,
    pub signal: Option<SignalStateSnapshot>,
    pub vix: Option<VixGearState>,
    pub execution: Option<ExecutionSnapshot>,
    pub last_event: Option<EventRecord>,
    pub events: usize,
}

impl StatusReport {
    /// Read-only: never initializes missing documents
    pub async fn collect(storage: &Storage) -> Result<Self> {
        let events = EventLog::new(storage.clone()).read_all().await?;
        Ok(Self {
            position: storage.load().await?,
            pnl: storage.load().await?,
            signal: storage.load().await?,
            vix: storage.load().await?,
            execution: storage.load().await?,
            events: events.len(),
            last_event: events.into_iter().last(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_empty_store_reports_nothing() {
        let storage = Storage::new(Arc::new(MemoryStore::new()));
        let report = StatusReport::collect(&storage).await.unwrap();
        assert!(report.position.is_none());
        assert!(report.last_event.is_none());
        assert_eq!(report.events, 0);
    }

    #[tokio::test]
    async fn test_reports_saved_position() {
        let storage = Storage::new(Arc::new(MemoryStore::new()));
        storage.save(&PositionState::default()).await.unwrap();

        let report = StatusReport::collect(&storage).await.unwrap();
        assert_eq!(report.position, Some(PositionState::default()));
        assert!(report.pnl.is_none());
    }
}
