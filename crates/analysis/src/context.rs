use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{CandleSeries, Direction};

use crate::config::AnalysisConfig;
use crate::structure::{StructureEvent, StructureKind};
use crate::swing::{SwingKind, SwingPoint};
use crate::zones::{zone_at, Zone, ZoneKind};

pub const TREND_FAST_PERIOD: usize = 20;
pub const TREND_SLOW_PERIOD: usize = 50;
/// Events confirmed within this many trailing bars count as recent.
pub const RECENT_BARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Sideways,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Up => write!(f, "uptrend"),
            Trend::Down => write!(f, "downtrend"),
            Trend::Sideways => write!(f, "sideways"),
        }
    }
}

/// Latest value of every indicator the analysis uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub rsi: Option<f64>,
    pub volume_zscore: Option<f64>,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
}

impl IndicatorSnapshot {
    /// Fast EMA above slow is an uptrend. Sideways while either is undefined.
    pub fn trend(&self) -> Trend {
        match (self.ema_fast, self.ema_slow) {
            (Some(fast), Some(slow)) if fast > slow => Trend::Up,
            (Some(fast), Some(slow)) if fast < slow => Trend::Down,
            _ => Trend::Sideways,
        }
    }
}

/// Human-facing summary of where the last candle sits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub trend: Trend,
    pub rsi: Option<f64>,
    pub overbought: bool,
    pub oversold: bool,
    /// Highest swing low or bullish order block midpoint below the close.
    pub nearest_support: Option<f64>,
    /// Lowest swing high or bearish order block midpoint above the close.
    pub nearest_resistance: Option<f64>,
    pub zone: Option<ZoneKind>,
    /// Indices of events confirmed in the last `RECENT_BARS` bars.
    pub recent_events: Vec<usize>,
}

/// `None` for an empty series.
pub fn market_context(
    series: &CandleSeries,
    swings: &[SwingPoint],
    events: &[StructureEvent],
    zones: &[Zone],
    indicators: &IndicatorSnapshot,
    config: &AnalysisConfig,
) -> Option<MarketContext> {
    let last = series.last()?;
    let close = last.close;

    // Swing lows and bullish order blocks hold price up; highs and bearish
    // blocks cap it.
    let levels = swings
        .iter()
        .map(|s| (s.price, s.kind == SwingKind::Low))
        .chain(events.iter().filter_map(|e| match e.kind {
            StructureKind::OrderBlock { .. } => {
                Some((e.range.mid(), e.direction == Direction::Bullish))
            }
            _ => None,
        }));
    let mut nearest_support: Option<f64> = None;
    let mut nearest_resistance: Option<f64> = None;
    for (price, supportive) in levels {
        if supportive && price < close {
            nearest_support = Some(nearest_support.map_or(price, |s| s.max(price)));
        } else if !supportive && price > close {
            nearest_resistance = Some(nearest_resistance.map_or(price, |r| r.min(price)));
        }
    }

    let cutoff = series.len().saturating_sub(RECENT_BARS);
    let recent_events = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.confirmed_at >= cutoff)
        .map(|(i, _)| i)
        .collect();

    Some(MarketContext {
        timestamp: last.timestamp,
        close,
        trend: indicators.trend(),
        rsi: indicators.rsi,
        overbought: indicators.rsi.is_some_and(|v| v >= config.rsi_overbought),
        oversold: indicators.rsi.is_some_and(|v| v <= config.rsi_oversold),
        nearest_support,
        nearest_resistance,
        zone: zone_at(zones, close),
        recent_events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swing::detect;
    use crate::test_support::from_highs_lows;

    #[test]
    fn trend_from_emas() {
        let up = IndicatorSnapshot {
            ema_fast: Some(11.0),
            ema_slow: Some(10.0),
            ..Default::default()
        };
        assert_eq!(up.trend(), Trend::Up);
        assert_eq!(IndicatorSnapshot::default().trend(), Trend::Sideways);
    }

    #[test]
    fn support_and_resistance_from_swings() {
        let s = from_highs_lows(&[
            (112.0, 110.0),
            (116.0, 113.0),
            (120.0, 117.0),
            (116.0, 110.0),
            (110.0, 104.0),
            (105.0, 100.0),
            (108.0, 103.0),
            (111.0, 106.0),
        ]);
        let swings = detect(&s, 2);
        let ctx = market_context(
            &s,
            &swings,
            &[],
            &[],
            &IndicatorSnapshot {
                rsi: Some(25.0),
                ..Default::default()
            },
            &AnalysisConfig::default(),
        )
        .unwrap();
        assert_eq!(ctx.nearest_support, Some(100.0));
        assert_eq!(ctx.nearest_resistance, Some(120.0));
        assert!(ctx.oversold);
        assert!(!ctx.overbought);
    }

    #[test]
    fn empty_series_has_no_context() {
        let s = CandleSeries::default();
        assert!(market_context(
            &s,
            &[],
            &[],
            &[],
            &IndicatorSnapshot::default(),
            &AnalysisConfig::default()
        )
        .is_none());
    }
}
