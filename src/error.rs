use thiserror::Error;

/// Main error type for the decision engine
#[derive(Error, Debug)]
pub enum GearError {
    // Configuration errors (fatal at boot)
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    // Broker adapter errors
    #[error("Broker adapter error in {operation}: {reason}")]
    Adapter {
        operation: String,
        reason: String,
        retryable: bool,
    },

    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Data contract errors (fatal to the current tick only)
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    // State machine errors
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for GearError
pub type Result<T> = std::result::Result<T, GearError>;

impl GearError {
    /// Transient adapter failure that is worth another attempt
    pub fn adapter(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        GearError::Adapter {
            operation: operation.into(),
            reason: reason.into(),
            retryable: true,
        }
    }

    /// Adapter failure that no amount of retrying will fix
    pub fn adapter_fatal(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        GearError::Adapter {
            operation: operation.into(),
            reason: reason.into(),
            retryable: false,
        }
    }

    pub fn contract(reason: impl Into<String>) -> Self {
        GearError::ContractViolation(reason.into())
    }

    /// Whether a retry policy should attempt the call again
    pub fn is_retryable(&self) -> bool {
        match self {
            GearError::Adapter { retryable, .. } => *retryable,
            GearError::Timeout(_) | GearError::Http(_) => true,
            _ => false,
        }
    }

    /// Whether the error came from the broker boundary (retried or not).
    /// The decision loop skips the tick and keeps the last persisted state.
    pub fn is_adapter(&self) -> bool {
        matches!(
            self,
            GearError::Adapter { .. }
                | GearError::RetriesExhausted { .. }
                | GearError::Timeout(_)
                | GearError::Http(_)
        )
    }

    /// Short stable code used as the issue key and in the event journal
    pub fn code(&self) -> &'static str {
        match self {
            GearError::Config(_) | GearError::InvalidConfig(_) => "E_CONFIG",
            GearError::Adapter { .. } | GearError::Http(_) => "E_ADAPTER",
            GearError::RetriesExhausted { .. } => "E_RETRIES_EXHAUSTED",
            GearError::Timeout(_) => "E_TIMEOUT",
            GearError::ContractViolation(_) => "E_CONTRACT",
            GearError::InvalidState(_) => "E_STATE",
            GearError::Json(_) => "E_JSON",
            GearError::Io(_) => "E_IO",
            GearError::Other(_) => "E_RUNTIME",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(GearError::adapter("get_quote", "connection reset").is_retryable());
        assert!(!GearError::adapter_fatal("login", "bad credentials").is_retryable());
        assert!(GearError::Timeout("get_candles".into()).is_retryable());
        assert!(!GearError::contract("close is missing").is_retryable());
    }

    #[test]
    fn test_adapter_errors_skip_the_tick() {
        let exhausted = GearError::RetriesExhausted {
            operation: "get_quote".into(),
            attempts: 3,
            last_error: "timeout".into(),
        };
        assert!(exhausted.is_adapter());
        assert!(!exhausted.is_retryable());
        assert_eq!(exhausted.code(), "E_RETRIES_EXHAUSTED");
        assert!(!GearError::contract("empty series").is_adapter());
    }

    #[test]
    fn test_invalid_config_lists_every_problem() {
        let err = GearError::InvalidConfig(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Invalid configuration: a; b");
    }
}
