use chrono::{Duration, TimeZone, Utc};
use common::{Candle, CandleSeries};

/// Full-body candles drifting up, ending in a long upper wick. Analysed with
/// default settings the last close sits on a bearish wick POI.
pub fn series_ending_in_wick() -> CandleSeries {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut candles: Vec<Candle> = (0..30)
        .map(|i| {
            let p = 100.0 + i as f64 * 0.1;
            Candle::new(start + Duration::hours(i), p, p + 0.12, p - 0.02, p + 0.1, 10.0)
        })
        .collect();
    candles.push(Candle::new(
        start + Duration::hours(30),
        103.0,
        106.0,
        102.98,
        103.1,
        10.0,
    ));
    CandleSeries::new(candles).unwrap()
}
