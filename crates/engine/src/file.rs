use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use common::{require_candles, CandleSeries, Error, MarketDataProvider, Result, Timeframe};

/// Candles read from a JSON file: an array of
/// `{"timestamp", "open", "high", "low", "close", "volume"}` objects.
///
/// The file holds one series, so the symbol and timeframe passed by callers
/// are only logged.
#[derive(Debug, Clone)]
pub struct CandleFile {
    path: PathBuf,
}

impl CandleFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<CandleSeries> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::DataUnavailable(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let series: CandleSeries = serde_json::from_str(&content)?;
        Ok(series)
    }

    /// Write `series` in the format `load` reads.
    pub async fn save(&self, series: &CandleSeries) -> Result<()> {
        let json = serde_json::to_string_pretty(series)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl MarketDataProvider for CandleFile {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<CandleSeries> {
        debug!(path = %self.path.display(), %symbol, %timeframe, limit, "Reading candle file");
        let series = self.load().await?;
        let skip = series.len().saturating_sub(limit);
        require_candles(
            CandleSeries::new(series.candles()[skip..].to_vec())?,
            symbol,
            timeframe,
        )
    }

    async fn fetch_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<CandleSeries> {
        debug!(path = %self.path.display(), %symbol, %timeframe, "Reading candle file range");
        let series = self.load().await?;
        let candles = series
            .iter()
            .filter(|c| c.timestamp >= start && c.timestamp <= end)
            .copied()
            .collect();
        require_candles(CandleSeries::new(candles)?, symbol, timeframe)
    }
}
