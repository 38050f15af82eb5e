pub mod candle;
pub mod decision;
pub mod execution;
pub mod gear;
pub mod market;
pub mod signal;
pub mod state;

pub use candle::*;
pub use decision::*;
pub use execution::*;
pub use gear::*;
pub use market::*;
pub use signal::*;
pub use state::*;
