use analysis::structure::within_tolerance;
use analysis::{
    detect, AnalysisConfig, Analyzer, SignalDirection, StructureTag, SwingKind, ZoneKind,
};
use chrono::{TimeZone, Utc};
use common::{Candle, CandleSeries};
use proptest::prelude::*;

fn make_series(steps: &[(f64, f64, f64, f64)]) -> CandleSeries {
    let mut candles = Vec::with_capacity(steps.len());
    let mut prev = 100.0_f64;
    for (i, &(delta, up, down, volume)) in steps.iter().enumerate() {
        let open = prev;
        let close = (prev + delta).max(1.0);
        let high = open.max(close) + up;
        let low = (open.min(close) - down).max(0.5);
        candles.push(Candle::new(
            Utc.timestamp_opt(1_700_000_000 + i as i64 * 900, 0).unwrap(),
            open,
            high,
            low,
            close,
            volume,
        ));
        prev = close;
    }
    CandleSeries::new(candles).unwrap()
}

fn steps(max_len: usize) -> impl Strategy<Value = Vec<(f64, f64, f64, f64)>> {
    prop::collection::vec(
        (-3.0f64..3.0, 0.0f64..1.5, 0.0f64..1.5, 1.0f64..1000.0),
        0..max_len,
    )
}

fn rising_series(n: usize) -> CandleSeries {
    let candles = (0..n)
        .map(|i| {
            let base = 100.0 + i as f64;
            Candle::new(
                Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap(),
                base,
                base + 1.2,
                base - 0.2,
                base + 1.0,
                50.0,
            )
        })
        .collect();
    CandleSeries::new(candles).unwrap()
}

#[test]
fn monotonic_rise_has_no_swings_and_no_structures() {
    let analyzer = Analyzer::new(AnalysisConfig::default()).unwrap();
    let a = analyzer.analyze(&rising_series(50));
    // Every bar makes a higher high and a higher low, so no bar is a local
    // extreme and nothing can be broken.
    assert!(a.swings.is_empty());
    assert!(a.events.is_empty());
    assert!(a.zones.is_empty());
    assert!(a.pois.is_empty());
    assert_eq!(a.signal.direction, SignalDirection::None);
}

#[test]
fn staircase_emits_only_bullish_bos() {
    // Three up, one down: higher highs and higher lows throughout.
    let mut closes = vec![100.0];
    for step in 0..60 {
        let last = *closes.last().unwrap();
        closes.push(if step % 4 == 3 { last - 1.0 } else { last + 1.5 });
    }
    let candles = closes
        .windows(2)
        .enumerate()
        .map(|(i, w)| {
            let (open, close) = (w[0], w[1]);
            let upper = if close > open { 0.3 } else { 0.05 };
            Candle::new(
                Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap(),
                open,
                open.max(close) + upper,
                open.min(close) - 0.1,
                close,
                50.0,
            )
        })
        .collect();
    let cfg = AnalysisConfig::builder().swing_lookback(1).build().unwrap();
    let analyzer = Analyzer::new(cfg).unwrap();
    let a = analyzer.analyze(&CandleSeries::new(candles).unwrap());

    let breaks: Vec<_> = a
        .events
        .iter()
        .filter(|e| matches!(e.tag(), StructureTag::Bos | StructureTag::Bms))
        .collect();
    assert!(!breaks.is_empty());
    assert!(breaks
        .iter()
        .all(|e| e.tag() == StructureTag::Bos && e.direction == common::Direction::Bullish));
}

proptest! {
    /// The full scan must never panic and must return the same result twice.
    #[test]
    fn analysis_is_deterministic(s in steps(160)) {
        let series = make_series(&s);
        let analyzer = Analyzer::new(AnalysisConfig::default()).unwrap();
        prop_assert_eq!(analyzer.analyze(&series), analyzer.analyze(&series));
    }

    #[test]
    fn confidence_is_bounded_and_none_is_zero(s in steps(160)) {
        let series = make_series(&s);
        let analyzer = Analyzer::new(AnalysisConfig::default()).unwrap();
        let signal = analyzer.analyze(&series).signal;
        prop_assert!((0.0..=1.0).contains(&signal.confidence));
        if signal.direction == SignalDirection::None {
            prop_assert_eq!(signal.confidence, 0.0);
            prop_assert!(signal.levels.is_none());
        } else {
            prop_assert!(signal.levels.is_some());
        }
    }

    #[test]
    fn trade_levels_bracket_the_entry(s in steps(200)) {
        let series = make_series(&s);
        let analyzer = Analyzer::new(AnalysisConfig::default()).unwrap();
        let signal = analyzer.analyze(&series).signal;
        if let Some(levels) = signal.levels {
            match signal.direction {
                SignalDirection::Long => {
                    prop_assert!(levels.stop < levels.entry);
                    prop_assert!(levels.entry < levels.target);
                }
                SignalDirection::Short => {
                    prop_assert!(levels.target < levels.entry);
                    prop_assert!(levels.entry < levels.stop);
                }
                SignalDirection::None => prop_assert!(false, "levels without direction"),
            }
        }
    }

    #[test]
    fn zones_keep_boundary_inside(s in steps(160)) {
        let series = make_series(&s);
        let analyzer = Analyzer::new(AnalysisConfig::default()).unwrap();
        let zones = analyzer.analyze(&series).zones;
        prop_assert!(zones.is_empty() || zones.len() == 3);
        for zone in &zones {
            prop_assert!(zone.range.low <= zone.equilibrium_boundary);
            prop_assert!(zone.equilibrium_boundary <= zone.range.high);
        }
        if let [discount, equilibrium, premium] = zones.as_slice() {
            prop_assert_eq!(discount.kind, ZoneKind::Discount);
            prop_assert_eq!(equilibrium.kind, ZoneKind::Equilibrium);
            prop_assert_eq!(premium.kind, ZoneKind::Premium);
            prop_assert!(discount.range.high <= premium.range.low);
        }
    }

    #[test]
    fn pois_have_positive_weight(s in steps(160)) {
        let series = make_series(&s);
        let analyzer = Analyzer::new(AnalysisConfig::default()).unwrap();
        let a = analyzer.analyze(&series);
        for poi in &a.pois {
            prop_assert!(poi.weight >= 1);
            prop_assert_eq!(poi.weight, poi.events.len());
        }
    }

    #[test]
    fn events_are_sorted_by_confirmation(s in steps(160)) {
        let series = make_series(&s);
        let analyzer = Analyzer::new(AnalysisConfig::default()).unwrap();
        let events = analyzer.analyze(&series).events;
        prop_assert!(events.windows(2).all(|w| w[0].confirmed_at <= w[1].confirmed_at));
        prop_assert!(events.iter().all(|e| e.confirmed_at < series.len()));
    }

    #[test]
    fn short_series_has_no_swings(k in 1usize..8, s in steps(16)) {
        let series = make_series(&s);
        prop_assume!(series.len() < 2 * k + 1);
        prop_assert!(detect(&series, k).is_empty());
    }

    #[test]
    fn swings_dominate_their_window(k in 1usize..6, s in steps(120)) {
        let series = make_series(&s);
        for swing in detect(&series, k) {
            let window = &series.candles()[swing.index - k..=swing.index + k];
            match swing.kind {
                SwingKind::High => prop_assert!(window.iter().all(|c| c.high <= swing.price)),
                SwingKind::Low => prop_assert!(window.iter().all(|c| c.low >= swing.price)),
            }
            prop_assert!(swing.strength >= k);
        }
    }

    #[test]
    fn equality_tolerance_is_symmetric(
        a in 0.01f64..100_000.0,
        b in 0.01f64..100_000.0,
        tol in 0.0f64..5.0,
    ) {
        prop_assert_eq!(within_tolerance(a, b, tol), within_tolerance(b, a, tol));
    }
}
