use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{info, warn};

use analysis::{Analysis, AnalyzerSet, PriceRange, SignalDirection};
use common::{MarketDataProvider, Notifier, Result, Timeframe};

use crate::alert::format_alert;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_LIMIT: usize = 500;

/// One (symbol, timeframe) pair the monitor polls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatchItem {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl WatchItem {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
        }
    }
}

impl fmt::Display for WatchItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.symbol, self.timeframe)
    }
}

/// The part of a signal that decides whether it is news.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDigest {
    pub direction: SignalDirection,
    /// Range of the entry POI, absent without a signal.
    pub entry_zone: Option<PriceRange>,
}

impl SignalDigest {
    pub fn from_analysis(analysis: &Analysis) -> Self {
        let entry_zone = analysis
            .signal
            .supporting_pois
            .first()
            .and_then(|&p| analysis.pois.get(p))
            .map(|poi| poi.range);
        Self {
            direction: analysis.signal.direction,
            entry_zone,
        }
    }
}

/// Alert only on a directional signal that differs from the last one seen.
pub fn should_notify(previous: Option<&SignalDigest>, current: &SignalDigest) -> bool {
    current.direction != SignalDirection::None && previous != Some(current)
}

/// Outcome of one polling cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub analysed: usize,
    pub failed: usize,
    pub alerts: usize,
}

/// Polls a watch-list on a timer and notifies when a pair's signal changes.
pub struct Monitor {
    provider: Arc<dyn MarketDataProvider>,
    notifier: Arc<dyn Notifier>,
    analyzers: AnalyzerSet,
    watch_list: Vec<WatchItem>,
    interval: Duration,
    limit: usize,
    last: HashMap<WatchItem, SignalDigest>,
}

impl Monitor {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        notifier: Arc<dyn Notifier>,
        analyzers: impl Into<AnalyzerSet>,
        watch_list: Vec<WatchItem>,
    ) -> Self {
        Self {
            provider,
            notifier,
            analyzers: analyzers.into(),
            watch_list,
            interval: DEFAULT_INTERVAL,
            limit: DEFAULT_LIMIT,
            last: HashMap::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Candles fetched per pair each cycle.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Fetch and analyse every pair concurrently, then notify on changes.
    ///
    /// A pair that fails to fetch is logged and skipped; its previous digest
    /// is kept so a recovered pair does not re-alert an unchanged signal. A
    /// signal is only recorded as seen once its alert was delivered.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut tasks = JoinSet::new();
        for item in self.watch_list.iter().cloned() {
            let provider = self.provider.clone();
            let analyzer = self.analyzers.get(item.timeframe);
            let limit = self.limit;
            tasks.spawn(async move {
                let result = provider
                    .fetch_candles(&item.symbol, item.timeframe, limit)
                    .await
                    .map(|series| analyzer.analyze(&series));
                (item, result)
            });
        }

        let mut results: Vec<(WatchItem, Result<Analysis>)> = Vec::new();
        let mut report = CycleReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(pair) => results.push(pair),
                Err(e) => {
                    warn!(error = %e, "Analysis task failed");
                    report.failed += 1;
                }
            }
        }
        // Deterministic notification order regardless of completion order.
        results.sort_by(|(a, _), (b, _)| {
            (a.symbol.as_str(), a.timeframe).cmp(&(b.symbol.as_str(), b.timeframe))
        });

        for (item, result) in results {
            let analysis = match result {
                Ok(analysis) => analysis,
                Err(e) => {
                    warn!(pair = %item, error = %e, "Skipping pair this cycle");
                    report.failed += 1;
                    continue;
                }
            };
            report.analysed += 1;

            let digest = SignalDigest::from_analysis(&analysis);
            if should_notify(self.last.get(&item), &digest) {
                if let Some(message) = format_alert(&item.symbol, item.timeframe, &analysis) {
                    info!(pair = %item, direction = %digest.direction, "Signal changed");
                    if let Err(e) = self.notifier.notify(&message).await {
                        // Digest not recorded: the alert is retried next cycle.
                        warn!(pair = %item, error = %e, "Failed to deliver alert");
                        continue;
                    }
                    report.alerts += 1;
                }
            }
            self.last.insert(item, digest);
        }
        report
    }

    /// Run cycles on the configured interval until `shutdown` resolves.
    /// The first cycle starts immediately.
    pub async fn run_until<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            pairs = self.watch_list.len(),
            interval = ?self.interval,
            "Monitor started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Monitor stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.run_cycle().await;
                    info!(
                        analysed = report.analysed,
                        failed = report.failed,
                        alerts = report.alerts,
                        "Monitor cycle complete"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::series_ending_in_wick;
    use analysis::{AnalysisConfig, Analyzer};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use common::{CandleSeries, Error};
    use std::sync::Mutex;

    /// Serves one fixed series for every symbol except "DEAD/USDT".
    struct FixedProvider {
        series: CandleSeries,
    }

    #[async_trait]
    impl MarketDataProvider for FixedProvider {
        async fn fetch_candles(
            &self,
            symbol: &str,
            _timeframe: Timeframe,
            _limit: usize,
        ) -> Result<CandleSeries> {
            if symbol == "DEAD/USDT" {
                return Err(Error::DataUnavailable("exchange down".into()));
            }
            Ok(self.series.clone())
        }

        async fn fetch_range(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<CandleSeries> {
            Ok(self.series.clone())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, message: &str) -> Result<()> {
            self.sent.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    /// Rejects the first `failures` messages, then records like
    /// `RecordingNotifier`.
    struct FlakyNotifier {
        failures: Mutex<usize>,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn notify(&self, message: &str) -> Result<()> {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(Error::Notification("chat unreachable".into()));
            }
            self.sent.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    fn make_monitor(
        series: CandleSeries,
        notifier: Arc<dyn Notifier>,
        watch_list: Vec<WatchItem>,
    ) -> Monitor {
        Monitor::new(
            Arc::new(FixedProvider { series }),
            notifier,
            Analyzer::new(AnalysisConfig::default()).unwrap(),
            watch_list,
        )
    }

    fn digest(direction: SignalDirection, low: f64) -> SignalDigest {
        SignalDigest {
            direction,
            entry_zone: Some(PriceRange::new(low, low + 1.0)),
        }
    }

    #[test]
    fn first_directional_signal_notifies() {
        assert!(should_notify(None, &digest(SignalDirection::Long, 100.0)));
    }

    #[test]
    fn unchanged_signal_is_silent() {
        let d = digest(SignalDirection::Long, 100.0);
        assert!(!should_notify(Some(&d), &d.clone()));
    }

    #[test]
    fn new_zone_or_direction_notifies() {
        let d = digest(SignalDirection::Long, 100.0);
        assert!(should_notify(Some(&d), &digest(SignalDirection::Short, 100.0)));
        assert!(should_notify(Some(&d), &digest(SignalDirection::Long, 105.0)));
    }

    #[test]
    fn none_never_notifies() {
        let none = SignalDigest {
            direction: SignalDirection::None,
            entry_zone: None,
        };
        assert!(!should_notify(None, &none));
        assert!(!should_notify(Some(&digest(SignalDirection::Long, 1.0)), &none));
    }

    #[tokio::test]
    async fn alerts_once_per_change() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut monitor = make_monitor(
            series_ending_in_wick(),
            notifier.clone(),
            vec![WatchItem::new("BTC/USDT", Timeframe::H4)],
        );

        let first = monitor.run_cycle().await;
        assert_eq!(first.analysed, 1);
        assert_eq!(first.alerts, 1);

        let second = monitor.run_cycle().await;
        assert_eq!(second.alerts, 0);
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failing_pair_does_not_stop_cycle() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut monitor = make_monitor(
            series_ending_in_wick(),
            notifier.clone(),
            vec![
                WatchItem::new("DEAD/USDT", Timeframe::H1),
                WatchItem::new("ETH/USDT", Timeframe::H1),
            ],
        );

        let report = monitor.run_cycle().await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.analysed, 1);
        assert_eq!(report.alerts, 1);
    }

    #[tokio::test]
    async fn run_until_stops_on_shutdown() {
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = make_monitor(
            series_ending_in_wick(),
            notifier.clone(),
            vec![WatchItem::new("BTC/USDT", Timeframe::H4)],
        )
        .with_interval(Duration::from_millis(10));

        monitor
            .run_until(tokio::time::sleep(Duration::from_millis(50)))
            .await;
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_delivery_is_retried_next_cycle() {
        let notifier = Arc::new(FlakyNotifier {
            failures: Mutex::new(1),
            sent: Mutex::new(Vec::new()),
        });
        let mut monitor = make_monitor(
            series_ending_in_wick(),
            notifier.clone(),
            vec![WatchItem::new("BTC/USDT", Timeframe::H4)],
        );

        let first = monitor.run_cycle().await;
        assert_eq!(first.analysed, 1);
        assert_eq!(first.alerts, 0);

        let second = monitor.run_cycle().await;
        assert_eq!(second.alerts, 1);
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);

        let third = monitor.run_cycle().await;
        assert_eq!(third.alerts, 0);
    }
}
