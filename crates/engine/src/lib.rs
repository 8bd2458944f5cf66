pub mod alert;
pub mod binance;
pub mod file;
pub mod monitor;
pub mod scan;

#[cfg(test)]
mod test_support;

pub use alert::format_alert;
pub use binance::BinanceClient;
pub use file::CandleFile;
pub use monitor::{should_notify, CycleReport, Monitor, SignalDigest, WatchItem};
pub use scan::{render_table, scan, ScanRow};
