//! State Store
//!
//! One JSON document per subsystem plus append-only JSONL journals.
//! Documents are overwritten whole on every save; the file implementation
//! writes a temp file, fsyncs it and renames it over the old document so a
//! crash never leaves a half-written snapshot behind.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{ExecutionSnapshot, PnLState, PositionState, SignalStateSnapshot, VixGearState};
use crate::error::{GearError, Result};

/// A persisted document with a fixed storage key
pub trait Snapshot: Serialize + DeserializeOwned + Send + Sync {
    const KEY: &'static str;
}

impl Snapshot for PositionState {
    const KEY: &'static str = "position_state";
}

impl Snapshot for PnLState {
    const KEY: &'static str = "pnl_state";
}

impl Snapshot for SignalStateSnapshot {
    const KEY: &'static str = "spot_signal_state";
}

impl Snapshot for VixGearState {
    const KEY: &'static str = "vix_state";
}

impl Snapshot for ExecutionSnapshot {
    const KEY: &'static str = "execution_state";
}

/// Journal names
pub mod journals {
    pub const EVENTS: &str = "events";
    pub const EQUITY_CURVE: &str = "equity_curve";
    pub const ISSUES_OPEN: &str = "issue_log_open";
    pub const ISSUES_CLOSED: &str = "issue_log_closed";
}

/// Raw storage backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a document, `None` if it was never written
    async fn read_document(&self, key: &str) -> Result<Option<String>>;

    /// Replace a document atomically
    async fn write_document(&self, key: &str, contents: &str) -> Result<()>;

    /// Append one line to a journal
    async fn append_line(&self, journal: &str, line: &str) -> Result<()>;

    /// All lines of a journal, oldest first
    async fn read_lines(&self, journal: &str) -> Result<Vec<String>>;
}

/// Typed access to a [`StateStore`]
#[derive(Clone)]
pub struct Storage {
    inner: Arc<dyn StateStore>,
}

impl Storage {
    pub fn new(inner: Arc<dyn StateStore>) -> Self {
        Self { inner }
    }

    pub async fn load<T: Snapshot>(&self) -> Result<Option<T>> {
        match self.inner.read_document(T::KEY).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn save<T: Snapshot>(&self, value: &T) -> Result<()> {
        let raw = serde_json::to_string_pretty(value)?;
        self.inner.write_document(T::KEY, &raw).await
    }

    /// Load the document, or write and return `init()` when it is missing
    pub async fn load_or_init<T: Snapshot>(&self, init: impl FnOnce() -> T) -> Result<T> {
        if let Some(value) = self.load::<T>().await? {
            return Ok(value);
        }
        let value = init();
        self.save(&value).await?;
        debug!(key = T::KEY, "initialized missing snapshot");
        Ok(value)
    }

    pub async fn append<T: Serialize + Sync>(&self, journal: &str, record: &T) -> Result<()> {
        let line = serde_json::to_string(record)?;
        self.inner.append_line(journal, &line).await
    }

    pub async fn read_journal<T: DeserializeOwned>(&self, journal: &str) -> Result<Vec<T>> {
        self.inner
            .read_lines(journal)
            .await?
            .iter()
            .map(|line| serde_json::from_str(line).map_err(GearError::from))
            .collect()
    }
}

/// Documents as `<dir>/<key>.json`, journals as `<dir>/<name>.jsonl`
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn journal_path(&self, journal: &str) -> PathBuf {
        self.dir.join(format!("{journal}.jsonl"))
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn read_document(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.document_path(key)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_document(&self, key: &str, contents: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.document_path(key);
        let tmp = self.dir.join(format!(".{key}.json.tmp"));

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        debug!(?path, bytes = contents.len(), "snapshot written");
        Ok(())
    }

    async fn append_line(&self, journal: &str, line: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.journal_path(journal))
            .await?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn read_lines(&self, journal: &str) -> Result<Vec<String>> {
        match tokio::fs::read_to_string(self.journal_path(journal)).await {
            Ok(raw) => Ok(raw
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Default)]
struct MemoryInner {
    documents: HashMap<String, String>,
    journals: HashMap<String, Vec<String>>,
}

/// In-memory store for tests and dry runs. Clones share the same contents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
    fail_writes: Arc<AtomicBool>,
    fail_appends: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent document write fail with an I/O error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent journal append fail with an I/O error
    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn read_document(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.lock().await.documents.get(key).cloned())
    }

    async fn write_document(&self, key: &str, contents: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GearError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("write to {key} refused"),
            )));
        }
        self.inner
            .lock()
            .await
            .documents
            .insert(key.to_string(), contents.to_string());
        Ok(())
    }

    async fn append_line(&self, journal: &str, line: &str) -> Result<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(GearError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("append to {journal} refused"),
            )));
        }
        self.inner
            .lock()
            .await
            .journals
            .entry(journal.to_string())
            .or_default()
            .push(line.to_string());
        Ok(())
    }

    async fn read_lines(&self, journal: &str) -> Result<Vec<String>> {
        Ok(self
            .inner
            .lock()
            .await
            .journals
            .get(journal)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LifecycleState, PositionSide};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn open_position() -> PositionState {
        PositionState {
            state: LifecycleState::Holding,
            position: Some(PositionSide::Long),
            entry_price: Some(25100.5),
            entry_ts: Some(Utc::now()),
            trade_count: 4,
            entry: None,
            last_exit: None,
        }
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(Arc::new(JsonFileStore::new(dir.path())));

        let position = open_position();
        storage.save(&position).await.unwrap();
        let loaded: PositionState = storage.load().await.unwrap().unwrap();
        assert_eq!(loaded, position);

        assert!(dir.path().join("position_state.json").exists());
        assert!(!dir.path().join(".position_state.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_document_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(Arc::new(JsonFileStore::new(dir.path().join("fresh"))));
        assert!(storage.load::<PnLState>().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_or_init_writes_default() {
        let store = MemoryStore::new();
        let storage = Storage::new(Arc::new(store.clone()));

        let state: PositionState = storage.load_or_init(PositionState::default).await.unwrap();
        assert!(state.is_flat());
        assert!(store.read_document("position_state").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_journal_appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(Arc::new(JsonFileStore::new(dir.path())));

        for equity in [dec!(10), dec!(25.5)] {
            let point = crate::domain::EquityPoint {
                ts: Utc::now(),
                equity,
            };
            storage.append(journals::EQUITY_CURVE, &point).await.unwrap();
        }

        let points: Vec<crate::domain::EquityPoint> =
            storage.read_journal(journals::EQUITY_CURVE).await.unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].equity, dec!(25.5));
    }

    #[tokio::test]
    async fn test_corrupt_document_is_an_error() {
        let mut mock = MockStateStore::new();
        mock.expect_read_document()
            .returning(|_| Ok(Some("{not json".to_string())));
        let storage = Storage::new(Arc::new(mock));

        let err = storage.load::<PositionState>().await.unwrap_err();
        assert!(matches!(err, GearError::Json(_)));
    }
}
