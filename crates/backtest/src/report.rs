use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use analysis::SignalDirection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    /// Held for the maximum number of bars, or the data ran out.
    Timeout,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop_loss"),
            ExitReason::TakeProfit => write!(f, "take_profit"),
            ExitReason::Timeout => write!(f, "timeout"),
        }
    }
}

/// One simulated round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub direction: SignalDirection,
    pub confidence: f64,
    pub entry_index: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub stop: f64,
    pub target: f64,
    pub exit_index: usize,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    /// Signed return in percent of the entry price.
    pub pnl_pct: f64,
    /// Account equity after this trade closed.
    pub equity_after: f64,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.pnl_pct > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    /// Percent of trades with a positive return.
    pub win_rate: f64,
    pub avg_profit_pct: f64,
    pub initial_equity: f64,
    pub final_equity: f64,
    pub roi_pct: f64,
    /// Largest peak-to-trough fall of equity across closed trades, percent.
    pub max_drawdown_pct: f64,
    pub trades: Vec<Trade>,
}

impl BacktestReport {
    pub fn from_trades(initial_equity: f64, trades: Vec<Trade>) -> Self {
        let total_trades = trades.len();
        let wins = trades.iter().filter(|t| t.is_win()).count();
        let final_equity = trades.last().map_or(initial_equity, |t| t.equity_after);

        let (win_rate, avg_profit_pct) = if total_trades > 0 {
            (
                wins as f64 / total_trades as f64 * 100.0,
                trades.iter().map(|t| t.pnl_pct).sum::<f64>() / total_trades as f64,
            )
        } else {
            (0.0, 0.0)
        };

        let mut peak = initial_equity;
        let mut max_drawdown_pct: f64 = 0.0;
        for trade in &trades {
            peak = peak.max(trade.equity_after);
            if peak > 0.0 {
                max_drawdown_pct = max_drawdown_pct.max((peak - trade.equity_after) / peak * 100.0);
            }
        }

        Self {
            total_trades,
            wins,
            losses: total_trades - wins,
            win_rate,
            avg_profit_pct,
            initial_equity,
            final_equity,
            roi_pct: (final_equity - initial_equity) / initial_equity * 100.0,
            max_drawdown_pct,
            trades,
        }
    }
}

impl fmt::Display for BacktestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Trades:        {}", self.total_trades)?;
        writeln!(f, "Wins / losses: {} / {}", self.wins, self.losses)?;
        writeln!(f, "Win rate:      {:.2}%", self.win_rate)?;
        writeln!(f, "Avg profit:    {:.2}%", self.avg_profit_pct)?;
        writeln!(f, "Final equity:  {:.2}", self.final_equity)?;
        writeln!(f, "ROI:           {:.2}%", self.roi_pct)?;
        write!(f, "Max drawdown:  {:.2}%", self.max_drawdown_pct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn trade(pnl_pct: f64, equity_after: f64) -> Trade {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Trade {
            direction: SignalDirection::Long,
            confidence: 0.5,
            entry_index: 0,
            entry_time: t,
            entry_price: 100.0,
            stop: 99.0,
            target: 102.0,
            exit_index: 1,
            exit_time: t,
            exit_price: 100.0 * (1.0 + pnl_pct / 100.0),
            exit_reason: ExitReason::Timeout,
            pnl_pct,
            equity_after,
        }
    }

    #[test]
    fn empty_report_is_flat() {
        let r = BacktestReport::from_trades(1000.0, Vec::new());
        assert_eq!(r.total_trades, 0);
        assert_eq!(r.win_rate, 0.0);
        assert_eq!(r.final_equity, 1000.0);
        assert_eq!(r.roi_pct, 0.0);
        assert_eq!(r.max_drawdown_pct, 0.0);
    }

    #[test]
    fn stats_from_trades() {
        let r = BacktestReport::from_trades(
            1000.0,
            vec![trade(10.0, 1100.0), trade(-20.0, 880.0), trade(5.0, 924.0)],
        );
        assert_eq!(r.total_trades, 3);
        assert_eq!(r.wins, 2);
        assert_eq!(r.losses, 1);
        assert!((r.win_rate - 66.666_666).abs() < 1e-3);
        assert!((r.avg_profit_pct - (-5.0 / 3.0)).abs() < 1e-9);
        assert!((r.roi_pct - (-7.6)).abs() < 1e-9);
        assert!((r.max_drawdown_pct - 20.0).abs() < 1e-9);
    }
}
