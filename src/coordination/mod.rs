//! Coordination Layer
//!
//! - Retry policy for supervised broker calls
//! - Quote feed and its single-writer cache
//! - Shutdown signalling

pub mod quote_feed;
pub mod retry;
pub mod shutdown;

pub use quote_feed::{QuoteCache, QuoteFeed, QuoteSlot, QuoteTarget};
pub use retry::{CallOutcome, RetryPolicy};
pub use shutdown::ShutdownController;
