use chrono::{TimeZone, Utc};
use common::{Candle, CandleSeries};

/// Candle at hour `index` with explicit OHLC and volume.
pub fn bar(index: usize, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
    Candle::new(
        Utc.timestamp_opt(1_700_000_000 + index as i64 * 3600, 0).unwrap(),
        open,
        high,
        low,
        close,
        volume,
    )
}

pub fn series(candles: Vec<Candle>) -> CandleSeries {
    CandleSeries::new(candles).unwrap()
}

/// One candle per `(high, low)` pair. Bodies sit in the middle half of the
/// range, colour alternating so no wick dominates.
pub fn from_highs_lows(points: &[(f64, f64)]) -> CandleSeries {
    let candles = points
        .iter()
        .enumerate()
        .map(|(i, &(high, low))| {
            let quarter = (high - low) / 4.0;
            let (open, close) = if i % 2 == 0 {
                (low + quarter, high - quarter)
            } else {
                (high - quarter, low + quarter)
            };
            bar(i, open, high, low, close, 100.0)
        })
        .collect();
    series(candles)
}

/// Each close becomes a candle opening at the previous close with a small
/// wick on both sides.
pub fn from_closes(closes: &[f64]) -> CandleSeries {
    let candles = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let pad = (open - close).abs() * 0.1 + close * 0.0005;
            bar(i, open, open.max(close) + pad, open.min(close) - pad, close, 100.0)
        })
        .collect();
    series(candles)
}
