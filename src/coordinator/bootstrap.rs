//! Bootstrap: wires the decision engine and quote feed from config
//!
//! Entry point for `niftygear run` and `niftygear once`. Builds the broker
//! gateway behind the retry policy, opens the session, resolves the
//! near-month future and hands everything to the engine.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::adapters::{notifier_from_env, BrokerGateway, NotificationSink, ReplayGateway, RetryingGateway};
use crate::config::AppConfig;
use crate::coordination::{
    QuoteCache, QuoteFeed, QuoteSlot, QuoteTarget, RetryPolicy, ShutdownController,
};
use crate::coordinator::engine::{DecisionEngine, EngineDeps, TickOutcome};
use crate::domain::InstrumentRef;
use crate::error::{GearError, Result};
use crate::persistence::{JsonFileStore, Storage};

/// A ready engine plus the feed that keeps its quote cache fresh
pub struct Runtime {
    pub engine: DecisionEngine,
    pub feed: QuoteFeed,
}

/// Storage rooted at the configured state directory
pub fn file_storage(config: &AppConfig) -> Storage {
    Storage::new(Arc::new(JsonFileStore::new(&config.storage.state_dir)))
}

/// Paper-mode gateway: replay files behind the retry policy
pub fn replay_gateway(config: &AppConfig) -> Arc<dyn BrokerGateway> {
    let replay = Arc::new(ReplayGateway::new(&config.broker.replay_dir));
    Arc::new(RetryingGateway::new(replay, RetryPolicy::from(&config.retry)))
}

fn quote_targets(config: &AppConfig, future: &InstrumentRef) -> Vec<QuoteTarget> {
    vec![
        QuoteTarget {
            slot: QuoteSlot::Spot,
            exchange: config.broker.spot_exchange.clone(),
            token: config.broker.spot_token.clone(),
        },
        QuoteTarget {
            slot: QuoteSlot::Vix,
            exchange: config.broker.vix_exchange.clone(),
            token: config.broker.vix_token.clone(),
        },
        QuoteTarget {
            slot: QuoteSlot::Future,
            exchange: future.exchange.clone(),
            token: future.token.clone(),
        },
    ]
}

/// Validate config, open the broker session and start the engine
pub async fn build_runtime(
    config: AppConfig,
    gateway: Arc<dyn BrokerGateway>,
    storage: Storage,
    notifier: Arc<dyn NotificationSink>,
) -> Result<Runtime> {
    config.validate().map_err(GearError::InvalidConfig)?;

    if !gateway.login().await? {
        return Err(GearError::adapter_fatal("login", "broker rejected the session"));
    }
    let future = gateway
        .resolve_instrument(&config.broker.future_exchange, &config.broker.future_search)
        .await?;
    info!(future = %future, "near-month future resolved");

    let quotes = Arc::new(QuoteCache::new());
    let feed = QuoteFeed::new(gateway.clone(), quotes.clone(), quote_targets(&config, &future));

    let engine = DecisionEngine::start(
        config,
        EngineDeps {
            gateway,
            storage,
            notifier,
            quotes,
            future,
        },
    )
    .await?;

    Ok(Runtime { engine, feed })
}

/// Paper-mode runtime from config alone
pub async fn bootstrap(config: AppConfig) -> Result<Runtime> {
    let gateway = replay_gateway(&config);
    let storage = file_storage(&config);
    build_runtime(config, gateway, storage, notifier_from_env()).await
}

/// Refresh quotes once and evaluate the newest closed bar
pub async fn run_once(config: AppConfig) -> Result<TickOutcome> {
    let Runtime { mut engine, feed } = bootstrap(config).await?;
    let refreshed = feed.refresh_once().await;
    if refreshed == 0 {
        warn!("no quotes refreshed before the bar tick");
    }

    let outcome = engine.bar_tick().await;
    if engine.lifecycle().state().state.is_open() {
        let position = engine.position_tick().await;
        info!(?position, "position checked");
    }
    Ok(outcome)
}

/// Run the loop and the quote feed until Ctrl-C
pub async fn run_until_shutdown(config: AppConfig) -> Result<()> {
    let refresh = Duration::from_secs(config.engine.quote_refresh_secs);
    let Runtime { engine, feed } = bootstrap(config).await?;

    let shutdown = ShutdownController::new();
    shutdown.listen_for_ctrl_c();

    // Prime the cache so the first bar tick has quotes to read
    feed.refresh_once().await;
    let feed_handle = feed.spawn(refresh, shutdown.subscribe());

    let result = engine.run(shutdown.subscribe()).await;
    shutdown.trigger();
    if let Err(e) = feed_handle.await {
        warn!(error = %e, "quote feed task ended abnormally");
    }
    result
}
