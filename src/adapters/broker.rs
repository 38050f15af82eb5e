use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::coordination::RetryPolicy;
use crate::domain::{InstrumentRef, Quote};
use crate::error::Result;

/// Broker boundary. Implementations do the network (or file) work and
/// return raw series payloads; parsing happens in the normalizer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// Establish a session
    async fn login(&self) -> Result<bool>;

    /// Last traded price and previous close for one instrument
    async fn get_quote(&self, exchange: &str, token: &str) -> Result<Quote>;

    /// Raw time-series payload between `start` and `end` (epoch seconds)
    async fn get_candles(
        &self,
        exchange: &str,
        token: &str,
        interval_mins: u32,
        start: i64,
        end: i64,
    ) -> Result<Value>;

    /// Look up a tradable instrument by search text
    async fn resolve_instrument(&self, exchange: &str, search_text: &str) -> Result<InstrumentRef>;
}

/// Wraps a gateway so every call goes through a bounded retry policy
pub struct RetryingGateway {
    inner: Arc<dyn BrokerGateway>,
    policy: RetryPolicy,
}

impl RetryingGateway {
    pub fn new(inner: Arc<dyn BrokerGateway>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl BrokerGateway for RetryingGateway {
    async fn login(&self) -> Result<bool> {
        self.policy
            .run("login", || self.inner.login())
            .await
            .into_result("login")
    }

    async fn get_quote(&self, exchange: &str, token: &str) -> Result<Quote> {
        self.policy
            .run("get_quote", || self.inner.get_quote(exchange, token))
            .await
            .into_result("get_quote")
    }

    async fn get_candles(
        &self,
        exchange: &str,
        token: &str,
        interval_mins: u32,
        start: i64,
        end: i64,
    ) -> Result<Value> {
        self.policy
            .run("get_candles", || {
                self.inner
                    .get_candles(exchange, token, interval_mins, start, end)
            })
            .await
            .into_result("get_candles")
    }

    async fn resolve_instrument(&self, exchange: &str, search_text: &str) -> Result<InstrumentRef> {
        self.policy
            .run("resolve_instrument", || {
                self.inner.resolve_instrument(exchange, search_text)
            })
            .await
            .into_result("resolve_instrument")
    }
}
