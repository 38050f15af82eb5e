//! Append-only audit journal (`events.jsonl`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::store::{journals, Storage};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Boot,
    Heartbeat,
    SignalSnapshot,
    Decision,
    Entry,
    Exit,
    Error,
    Shutdown,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Boot => "BOOT",
            EventKind::Heartbeat => "HEARTBEAT",
            EventKind::SignalSnapshot => "SIGNAL_SNAPSHOT",
            EventKind::Decision => "DECISION",
            EventKind::Entry => "ENTRY",
            EventKind::Exit => "EXIT",
            EventKind::Error => "ERROR",
            EventKind::Shutdown => "SHUTDOWN",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One journal line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub ts: DateTime<Utc>,
    pub event: EventKind,
    pub trace_id: String,
    pub data: serde_json::Value,
}

#[derive(Clone)]
pub struct EventLog {
    storage: Storage,
}

impl EventLog {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub async fn append(
        &self,
        event: EventKind,
        trace_id: &str,
        data: serde_json::Value,
    ) -> Result<EventRecord> {
        let record = EventRecord {
            ts: Utc::now(),
            event,
            trace_id: trace_id.to_string(),
            data,
        };
        self.storage.append(journals::EVENTS, &record).await?;
        Ok(record)
    }

    pub async fn read_all(&self) -> Result<Vec<EventRecord>> {
        self.storage.read_journal(journals::EVENTS).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_events_are_appended_with_trace_id() {
        let log = EventLog::new(Storage::new(Arc::new(MemoryStore::new())));
        log.append(EventKind::Boot, "t-1", json!({"mode": "replay"}))
            .await
            .unwrap();
        log.append(EventKind::Heartbeat, "t-2", json!({})).await.unwrap();

        let events = log.read_all().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, EventKind::Boot);
        assert_eq!(events[0].data["mode"], "replay");
        assert_eq!(events[1].trace_id, "t-2");
    }

    #[test]
    fn test_event_serializes_screaming_name() {
        let value = serde_json::to_value(EventKind::SignalSnapshot).unwrap();
        assert_eq!(value, "SIGNAL_SNAPSHOT");
    }
}
