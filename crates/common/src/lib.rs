pub mod config;
pub mod error;
pub mod exchange;
pub mod notify;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use exchange::{require_candles, MarketDataProvider};
pub use notify::{LogNotifier, Notifier};
pub use types::*;
