pub mod event_log;
pub mod store;

pub use event_log::{EventKind, EventLog, EventRecord};
pub use store::{journals, JsonFileStore, MemoryStore, Snapshot, StateStore, Storage};
