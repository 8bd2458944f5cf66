pub mod report;

pub use report::{BacktestReport, ExitReason, Trade};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use analysis::{Analyzer, SignalDirection, TradeLevels};
use common::{Candle, CandleSeries, Error, Result};

/// Replay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Bars skipped before the first snapshot so indicators can settle.
    pub warmup: usize,
    /// Signals below this confidence are not traded.
    pub min_confidence: f64,
    /// Bars a trade may stay open before it is closed at the bar's close.
    pub max_hold: usize,
    pub initial_equity: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            warmup: 50,
            min_confidence: 0.0,
            max_hold: 20,
            initial_equity: 1000.0,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.warmup == 0 {
            return Err(Error::InvalidConfiguration("warmup must be at least 1".into()));
        }
        if self.max_hold == 0 {
            return Err(Error::InvalidConfiguration("max_hold must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(Error::InvalidConfiguration(
                "min_confidence must be within [0, 1]".into(),
            ));
        }
        if !(self.initial_equity.is_finite() && self.initial_equity > 0.0) {
            return Err(Error::InvalidConfiguration(
                "initial_equity must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Replays a series bar by bar, analysing only the candles seen so far.
///
/// A signal computed on the close of bar `i` is entered at the open of bar
/// `i + 1`. One trade is open at a time. Each bar checks the stop before the
/// target, so a bar touching both counts as a loss.
pub struct Backtester {
    analyzer: Analyzer,
    config: BacktestConfig,
}

impl Backtester {
    pub fn new(analyzer: Analyzer, config: BacktestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { analyzer, config })
    }

    pub fn run(&self, series: &CandleSeries) -> BacktestReport {
        let candles = series.candles();
        let mut equity = self.config.initial_equity;
        let mut trades = Vec::new();
        let mut i = self.config.warmup;

        while i + 1 < candles.len() {
            let analysis = self.analyzer.analyze(&series.prefix(i + 1));
            let signal = &analysis.signal;

            let levels = match signal.levels {
                Some(levels) if signal.confidence >= self.config.min_confidence => levels,
                _ => {
                    i += 1;
                    continue;
                }
            };

            let entry_index = i + 1;
            let entry_price = candles[entry_index].open;
            if !opens_inside(signal.direction, entry_price, &levels) {
                debug!(bar = entry_index, "Open gapped past stop or target, skipping");
                i += 1;
                continue;
            }

            let Some((exit_index, exit_price, exit_reason)) = settle(
                candles,
                entry_index,
                signal.direction,
                &levels,
                self.config.max_hold,
            ) else {
                break;
            };
            let pnl_pct = match signal.direction {
                SignalDirection::Short => (entry_price - exit_price) / entry_price * 100.0,
                _ => (exit_price - entry_price) / entry_price * 100.0,
            };
            equity *= 1.0 + pnl_pct / 100.0;

            debug!(
                direction = %signal.direction,
                entry = entry_price,
                exit = exit_price,
                reason = %exit_reason,
                pnl_pct,
                "Trade closed"
            );
            trades.push(Trade {
                direction: signal.direction,
                confidence: signal.confidence,
                entry_index,
                entry_time: candles[entry_index].timestamp,
                entry_price,
                stop: levels.stop,
                target: levels.target,
                exit_index,
                exit_time: candles[exit_index].timestamp,
                exit_price,
                exit_reason,
                pnl_pct,
                equity_after: equity,
            });

            // The exit bar's close is the next decision point.
            i = exit_index;
        }

        let report = BacktestReport::from_trades(self.config.initial_equity, trades);
        info!(
            trades = report.total_trades,
            win_rate = report.win_rate,
            roi_pct = report.roi_pct,
            "Backtest complete"
        );
        report
    }
}

fn opens_inside(direction: SignalDirection, open: f64, levels: &TradeLevels) -> bool {
    match direction {
        SignalDirection::Long => levels.stop < open && open < levels.target,
        SignalDirection::Short => levels.target < open && open < levels.stop,
        SignalDirection::None => false,
    }
}

/// Walk forward from the entry bar until the stop or target is touched, or
/// `max_hold` bars pass. Returns the exit bar, price and reason, or `None`
/// when `entry_index` is past the end of `candles`.
pub fn settle(
    candles: &[Candle],
    entry_index: usize,
    direction: SignalDirection,
    levels: &TradeLevels,
    max_hold: usize,
) -> Option<(usize, f64, ExitReason)> {
    if entry_index >= candles.len() {
        return None;
    }
    let last = (entry_index + max_hold.max(1) - 1).min(candles.len() - 1);
    for (j, candle) in candles.iter().enumerate().take(last + 1).skip(entry_index) {
        let (stopped, hit_target) = match direction {
            SignalDirection::Short => (candle.high >= levels.stop, candle.low <= levels.target),
            _ => (candle.low <= levels.stop, candle.high >= levels.target),
        };
        if stopped {
            return Some((j, levels.stop, ExitReason::StopLoss));
        }
        if hit_target {
            return Some((j, levels.target, ExitReason::TakeProfit));
        }
    }
    Some((last, candles[last].close, ExitReason::Timeout))
}
