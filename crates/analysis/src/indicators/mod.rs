pub mod ema;
pub mod rsi;
pub mod volume;

pub use ema::ema;
pub use rsi::{rsi, RsiIndicator};
pub use volume::volume_zscore;
