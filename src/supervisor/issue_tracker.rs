//! Issue Tracker
//!
//! Turns recurring errors into open issues and closes them automatically
//! once the loop has run cleanly for a number of ticks. Every change is
//! journaled to `issue_log_open.jsonl` / `issue_log_closed.jsonl`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::error::Result;
use crate::persistence::{journals, Storage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueEvent {
    IssueOpen,
    IssueSeen,
    IssueClosed,
}

/// One journal line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub ts: DateTime<Utc>,
    pub event: IssueEvent,
    pub issue_key: String,
    pub title: String,
    pub count: u32,
    pub details: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct OpenIssue {
    title: String,
    opened_at: DateTime<Utc>,
    count: u32,
    ok_ticks: u32,
    details: serde_json::Value,
}

pub struct IssueTracker {
    storage: Storage,
    close_after_ok: u32,
    open: HashMap<String, OpenIssue>,
}

impl IssueTracker {
    pub fn new(storage: Storage, close_after_ok: u32) -> Self {
        Self {
            storage,
            close_after_ok: close_after_ok.max(1),
            open: HashMap::new(),
        }
    }

    pub fn open_issues(&self) -> usize {
        self.open.len()
    }

    pub fn is_open(&self, issue_key: &str) -> bool {
        self.open.contains_key(issue_key)
    }

    /// Record an occurrence: opens the issue or bumps its count
    pub async fn track(
        &mut self,
        issue_key: &str,
        title: &str,
        details: serde_json::Value,
    ) -> Result<()> {
        let now = Utc::now();
        let (event, count) = match self.open.get_mut(issue_key) {
            Some(issue) => {
                issue.count += 1;
                issue.ok_ticks = 0;
                issue.details = details.clone();
                (IssueEvent::IssueSeen, issue.count)
            }
            None => {
                warn!(issue_key, title, "issue opened");
                self.open.insert(
                    issue_key.to_string(),
                    OpenIssue {
                        title: title.to_string(),
                        opened_at: now,
                        count: 1,
                        ok_ticks: 0,
                        details: details.clone(),
                    },
                );
                (IssueEvent::IssueOpen, 1)
            }
        };

        let record = IssueRecord {
            ts: now,
            event,
            issue_key: issue_key.to_string(),
            title: title.to_string(),
            count,
            details,
            opened_at: None,
        };
        self.storage.append(journals::ISSUES_OPEN, &record).await
    }

    /// Count a healthy tick against every open issue; close those that
    /// reached the threshold. Returns the keys closed.
    pub async fn mark_healthy(&mut self) -> Result<Vec<String>> {
        let threshold = self.close_after_ok;
        let mut closing: Vec<String> = Vec::new();
        for (key, issue) in self.open.iter_mut() {
            issue.ok_ticks += 1;
            if issue.ok_ticks >= threshold {
                closing.push(key.clone());
            }
        }
        closing.sort();

        for key in &closing {
            if let Some(issue) = self.open.remove(key) {
                let record = IssueRecord {
                    ts: Utc::now(),
                    event: IssueEvent::IssueClosed,
                    issue_key: key.clone(),
                    title: issue.title,
                    count: issue.count,
                    details: issue.details,
                    opened_at: Some(issue.opened_at),
                };
                self.storage.append(journals::ISSUES_CLOSED, &record).await?;
                info!(issue_key = %key, count = issue.count, "issue auto-closed");
            }
        }
        Ok(closing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_open_seen_then_auto_close() {
        let storage = Storage::new(Arc::new(MemoryStore::new()));
        let mut tracker = IssueTracker::new(storage.clone(), 3);

        tracker
            .track("E_RETRIES_EXHAUSTED", "get_quote failed", json!({"attempts": 3}))
            .await
            .unwrap();
        tracker
            .track("E_RETRIES_EXHAUSTED", "get_quote failed", json!({"attempts": 3}))
            .await
            .unwrap();
        assert!(tracker.is_open("E_RETRIES_EXHAUSTED"));

        assert!(tracker.mark_healthy().await.unwrap().is_empty());
        assert!(tracker.mark_healthy().await.unwrap().is_empty());
        let closed = tracker.mark_healthy().await.unwrap();
        assert_eq!(closed, vec!["E_RETRIES_EXHAUSTED".to_string()]);
        assert_eq!(tracker.open_issues(), 0);

        let open_log: Vec<IssueRecord> = storage.read_journal(journals::ISSUES_OPEN).await.unwrap();
        assert_eq!(open_log[0].event, IssueEvent::IssueOpen);
        assert_eq!(open_log[1].event, IssueEvent::IssueSeen);
        assert_eq!(open_log[1].count, 2);

        let closed_log: Vec<IssueRecord> =
            storage.read_journal(journals::ISSUES_CLOSED).await.unwrap();
        assert_eq!(closed_log.len(), 1);
        assert_eq!(closed_log[0].count, 2);
        assert!(closed_log[0].opened_at.is_some());
    }

    #[tokio::test]
    async fn test_recurrence_resets_healthy_count() {
        let storage = Storage::new(Arc::new(MemoryStore::new()));
        let mut tracker = IssueTracker::new(storage, 2);

        tracker.track("E_CONTRACT", "bad candles", json!({})).await.unwrap();
        tracker.mark_healthy().await.unwrap();
        tracker.track("E_CONTRACT", "bad candles", json!({})).await.unwrap();
        assert!(tracker.mark_healthy().await.unwrap().is_empty());
        assert_eq!(tracker.mark_healthy().await.unwrap().len(), 1);
    }
}
