pub mod broker;
pub mod normalizer;
pub mod notifier;
pub mod replay;
pub mod telegram;

pub use broker::{BrokerGateway, RetryingGateway};
pub use normalizer::{normalize_candles, normalize_quote};
pub use notifier::{notifier_from_env, notify_detached, LogNotifier, NotificationSink};
pub use replay::ReplayGateway;
pub use telegram::TelegramNotifier;

#[cfg(test)]
pub use broker::MockBrokerGateway;
