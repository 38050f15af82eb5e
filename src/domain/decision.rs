use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which exit route fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitRoute {
    IntrabarRisk,
    SignalExit,
}

impl ExitRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitRoute::IntrabarRisk => "INTRABAR_RISK",
            ExitRoute::SignalExit => "SIGNAL_EXIT",
        }
    }
}

impl fmt::Display for ExitRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Route-1 risk check result for one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskDecision {
    pub exit_now: bool,
    pub reason: String,
    pub ts: DateTime<Utc>,
}

impl RiskDecision {
    pub fn exit(reason: impl Into<String>) -> Self {
        Self {
            exit_now: true,
            reason: reason.into(),
            ts: Utc::now(),
        }
    }

    pub fn hold(reason: impl Into<String>) -> Self {
        Self {
            exit_now: false,
            reason: reason.into(),
            ts: Utc::now(),
        }
    }
}

/// Combined exit decision for one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitDecision {
    pub exit_now: bool,
    pub route: Option<ExitRoute>,
    pub reason: String,
    pub ts: DateTime<Utc>,
}
