use common::CandleSeries;

/// RSI (Relative Strength Index) indicator.
///
/// Uses Wilder's smoothed moving average (same as TradingView / standard RSI).
/// Undefined until at least `period + 1` closes are available.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub period: usize,
    pub overbought: f64,
    pub oversold: f64,
}

impl RsiIndicator {
    pub fn new(period: usize, overbought: f64, oversold: f64) -> Self {
        assert!(period >= 2, "RSI period must be >= 2");
        Self { period, overbought, oversold }
    }

    /// RSI of the last close, `None` with fewer than `period + 1` values.
    pub fn compute(&self, closes: &[f64]) -> Option<f64> {
        self.series(closes).last().copied().flatten()
    }

    /// RSI aligned to `closes`: the first `period` entries are `None`.
    pub fn series(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let period = self.period;
        let mut out = vec![None; closes.len()];
        if closes.len() < period + 1 {
            return out;
        }

        // First average gain/loss over the initial `period` changes
        let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
        let initial = &changes[..period];

        let mut avg_gain = initial.iter().filter(|&&c| c > 0.0).sum::<f64>() / period as f64;
        let mut avg_loss =
            initial.iter().filter(|&&c| c < 0.0).map(|c| c.abs()).sum::<f64>() / period as f64;
        out[period] = Some(rsi_value(avg_gain, avg_loss));

        // Wilder smoothing over remaining changes
        for (offset, &change) in changes[period..].iter().enumerate() {
            let gain = if change > 0.0 { change } else { 0.0 };
            let loss = if change < 0.0 { change.abs() } else { 0.0 };
            avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
            out[period + 1 + offset] = Some(rsi_value(avg_gain, avg_loss));
        }
        out
    }

    pub fn is_overbought(&self, value: f64) -> bool {
        value >= self.overbought
    }

    pub fn is_oversold(&self, value: f64) -> bool {
        value <= self.oversold
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        // A flat window has no momentum either way.
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// RSI over the closes of `series`. A `period` below 2 yields all `None`.
pub fn rsi(series: &CandleSeries, period: usize) -> Vec<Option<f64>> {
    if period < 2 {
        return vec![None; series.len()];
    }
    RsiIndicator::new(period, 70.0, 30.0).series(&series.closes())
}
