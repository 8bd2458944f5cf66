use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{CandleSeries, Error, Result, Timeframe};

/// Source of historical candles.
///
/// `BinanceClient` implements this against the public REST API.
/// `CandleFile` implements this for offline data.
///
/// Implementations must return candles in strictly ascending timestamp order.
/// An empty result counts as a failure. Failures are reported as `Error::DataUnavailable` and are not retried by
/// the analysis code; retry policy belongs to the implementation.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch the most recent `limit` candles for `symbol` (e.g. `BTC/USDT`).
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<CandleSeries>;

    /// Fetch every candle opened in `[start, end]`.
    async fn fetch_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<CandleSeries>;
}

/// Turn an empty provider result into `Error::DataUnavailable`.
pub fn require_candles(
    series: CandleSeries,
    symbol: &str,
    timeframe: Timeframe,
) -> Result<CandleSeries> {
    if series.is_empty() {
        return Err(Error::DataUnavailable(format!(
            "no candles for {symbol} {timeframe}"
        )));
    }
    Ok(series)
}
