use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::warn;

use analysis::{Analysis, AnalyzerSet, SignalDirection, Trend};
use common::{MarketDataProvider, Timeframe};

use crate::monitor::WatchItem;

/// One line of a multi-timeframe overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRow {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub price: Option<f64>,
    pub trend: Trend,
    pub rsi: Option<f64>,
    pub pois: usize,
    pub direction: SignalDirection,
    pub confidence: f64,
    /// Set when the pair could not be analysed.
    pub error: Option<String>,
}

impl ScanRow {
    fn from_analysis(item: &WatchItem, analysis: &Analysis) -> Self {
        Self {
            symbol: item.symbol.clone(),
            timeframe: item.timeframe,
            price: analysis.context.as_ref().map(|c| c.close),
            trend: analysis.indicators.trend(),
            rsi: analysis.indicators.rsi,
            pois: analysis.pois.len(),
            direction: analysis.signal.direction,
            confidence: analysis.signal.confidence,
            error: None,
        }
    }

    fn failed(item: &WatchItem, error: String) -> Self {
        Self {
            symbol: item.symbol.clone(),
            timeframe: item.timeframe,
            price: None,
            trend: Trend::Sideways,
            rsi: None,
            pois: 0,
            direction: SignalDirection::None,
            confidence: 0.0,
            error: Some(error),
        }
    }
}

/// Analyse every item concurrently with the analyzer of its timeframe. Rows
/// come back in `items` order; a failed pair yields a row with `error` set.
pub async fn scan(
    provider: Arc<dyn MarketDataProvider>,
    analyzers: &AnalyzerSet,
    items: &[WatchItem],
    limit: usize,
) -> Vec<ScanRow> {
    let mut tasks = JoinSet::new();
    for (position, item) in items.iter().cloned().enumerate() {
        let provider = provider.clone();
        let analyzer = analyzers.get(item.timeframe);
        tasks.spawn(async move {
            let row = match provider.fetch_candles(&item.symbol, item.timeframe, limit).await {
                Ok(series) => ScanRow::from_analysis(&item, &analyzer.analyze(&series)),
                Err(e) => {
                    warn!(pair = %item, error = %e, "Scan failed for pair");
                    ScanRow::failed(&item, e.to_string())
                }
            };
            (position, row)
        });
    }

    let mut rows: Vec<(usize, ScanRow)> = Vec::with_capacity(items.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(row) => rows.push(row),
            Err(e) => warn!(error = %e, "Scan task failed"),
        }
    }
    rows.sort_by_key(|(position, _)| *position);
    rows.into_iter().map(|(_, row)| row).collect()
}

/// Fixed-width text table of `rows`.
pub fn render_table(rows: &[ScanRow]) -> String {
    let mut out = format!(
        "{:<12} {:<4} {:>14} {:<10} {:>6} {:>5} {:<6} {:>6}\n",
        "SYMBOL", "TF", "PRICE", "TREND", "RSI", "POIS", "SIGNAL", "CONF"
    );
    for row in rows {
        if let Some(error) = &row.error {
            out.push_str(&format!(
                "{:<12} {:<4} error: {error}\n",
                row.symbol,
                row.timeframe.as_str()
            ));
            continue;
        }
        let price = row.price.map_or("-".to_string(), |p| format!("{p:.4}"));
        let rsi = row.rsi.map_or("-".to_string(), |r| format!("{r:.1}"));
        out.push_str(&format!(
            "{:<12} {:<4} {:>14} {:<10} {:>6} {:>5} {:<6} {:>5.0}%\n",
            row.symbol,
            row.timeframe.as_str(),
            price,
            row.trend.to_string(),
            rsi,
            row.pois,
            row.direction.to_string(),
            row.confidence * 100.0
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::CandleFile;
    use crate::test_support::series_ending_in_wick;
    use analysis::{AnalysisConfig, Analyzer};

    #[tokio::test]
    async fn rows_follow_input_order_and_mark_failures() {
        let path = std::env::temp_dir().join(format!("smc-scan-{}.json", std::process::id()));
        let file = CandleFile::new(&path);
        file.save(&series_ending_in_wick()).await.unwrap();

        let provider: Arc<dyn MarketDataProvider> = Arc::new(file);
        let missing: Arc<dyn MarketDataProvider> =
            Arc::new(CandleFile::new(path.with_extension("missing")));
        let analyzers = AnalyzerSet::from(Analyzer::new(AnalysisConfig::default()).unwrap());
        let items = vec![
            WatchItem::new("BTC/USDT", Timeframe::H1),
            WatchItem::new("BTC/USDT", Timeframe::H4),
        ];

        let rows = scan(provider, &analyzers, &items, 500).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].timeframe, Timeframe::H1);
        assert_eq!(rows[1].timeframe, Timeframe::H4);
        assert_eq!(rows[0].direction, SignalDirection::Short);

        let failed = scan(missing, &analyzers, &items[..1], 500).await;
        assert!(failed[0].error.is_some());
        assert!(render_table(&failed).contains("error:"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn table_has_header_and_rows() {
        let row = ScanRow {
            symbol: "BTC/USDT".into(),
            timeframe: Timeframe::H4,
            price: Some(42000.0),
            trend: Trend::Up,
            rsi: Some(55.0),
            pois: 3,
            direction: SignalDirection::Long,
            confidence: 0.65,
            error: None,
        };
        let table = render_table(&[row]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("SYMBOL"));
        assert!(lines[1].contains("LONG"));
        assert!(lines[1].contains("65%"));
    }
}
