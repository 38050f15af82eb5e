use serde::{Deserialize, Serialize};

/// Point-in-time quote for one instrument
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Last traded price
    pub last_price: f64,
    /// Previous session close, when the broker reports it
    #[serde(default)]
    pub close: Option<f64>,
}

/// Resolved tradable instrument
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentRef {
    pub exchange: String,
    pub symbol: String,
    pub token: String,
}

impl std::fmt::Display for InstrumentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} ({})", self.exchange, self.symbol, self.token)
    }
}
