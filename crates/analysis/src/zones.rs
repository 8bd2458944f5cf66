use std::fmt;

use serde::{Deserialize, Serialize};

use common::{Candle, CandleSeries, Direction};

use crate::config::AnalysisConfig;
use crate::range::PriceRange;
use crate::structure::{breaks, StructureEvent, StructureKind};
use crate::swing::{SwingId, SwingKind, SwingPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Discount,
    Equilibrium,
    Premium,
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneKind::Discount => write!(f, "discount"),
            ZoneKind::Equilibrium => write!(f, "equilibrium"),
            ZoneKind::Premium => write!(f, "premium"),
        }
    }
}

/// The price range a set of zones is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorRange {
    /// Swing whose break defined the range. `None` for the initial range,
    /// taken from the first confirmed swing high and low before any break.
    pub broken: Option<SwingId>,
    /// Bar from which the range applies.
    pub confirmed_at: usize,
    pub range: PriceRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub kind: ZoneKind,
    pub range: PriceRange,
    /// The boundary of this zone nearest the equilibrium level, or the level
    /// itself for the equilibrium zone. Always within `range`.
    pub equilibrium_boundary: f64,
    pub anchor: AnchorRange,
}

/// Range of the impulse leg behind the latest BOS/BMS.
///
/// A bullish break spans from the lowest low between the broken swing high
/// and the breaking bar up to the broken high; a bearish break mirrors it.
/// The range only moves on a new break. Before the first break the first
/// confirmed swing high and swing low are used. `None` when neither gives a
/// range of positive width.
pub fn anchor_range(series: &CandleSeries, swings: &[SwingPoint]) -> Option<AnchorRange> {
    let candles = series.candles();
    breaks(candles, swings)
        .iter()
        .rev()
        .find_map(|brk| impulse_range(candles, swings, brk))
        .or_else(|| initial_range(series, swings))
}

fn impulse_range(
    candles: &[Candle],
    swings: &[SwingPoint],
    brk: &StructureEvent,
) -> Option<AnchorRange> {
    let broken = match brk.kind {
        StructureKind::Bos { broken, .. } | StructureKind::Bms { broken, .. } => broken,
        _ => return None,
    };
    let swing = swings.get(broken)?;
    let leg = candles.get(swing.index..=brk.confirmed_at)?;
    let range = match brk.direction {
        Direction::Bullish => {
            let origin = leg.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
            PriceRange::new(origin, swing.price)
        }
        Direction::Bearish => {
            let origin = leg.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
            PriceRange::new(swing.price, origin)
        }
    };
    (range.width() > 0.0).then_some(AnchorRange {
        broken: Some(broken),
        confirmed_at: brk.confirmed_at,
        range,
    })
}

fn initial_range(series: &CandleSeries, swings: &[SwingPoint]) -> Option<AnchorRange> {
    let known = |s: &&SwingPoint| s.confirmed_at < series.len();
    let high = swings.iter().filter(known).find(|s| s.kind == SwingKind::High)?;
    let low = swings.iter().filter(known).find(|s| s.kind == SwingKind::Low)?;
    if high.price <= low.price {
        return None;
    }
    Some(AnchorRange {
        broken: None,
        confirmed_at: high.confirmed_at.max(low.confirmed_at),
        range: PriceRange::new(low.price, high.price),
    })
}

/// Discount, equilibrium and premium zones of the anchor range, in
/// ascending price order. Empty when no anchor range exists.
pub fn compute_zones(
    series: &CandleSeries,
    swings: &[SwingPoint],
    config: &AnalysisConfig,
) -> Vec<Zone> {
    let Some(anchor) = anchor_range(series, swings) else {
        return Vec::new();
    };
    let lo = anchor.range.low;
    let hi = anchor.range.high;
    let level = |fraction: f64| lo + anchor.range.width() * fraction;

    let discount_top = level(config.discount_level);
    let premium_bottom = level(config.premium_level);
    let equilibrium = level(config.equilibrium_level);

    vec![
        Zone {
            kind: ZoneKind::Discount,
            range: PriceRange::new(lo, discount_top),
            equilibrium_boundary: discount_top,
            anchor,
        },
        Zone {
            kind: ZoneKind::Equilibrium,
            range: PriceRange::new(discount_top, premium_bottom),
            equilibrium_boundary: equilibrium,
            anchor,
        },
        Zone {
            kind: ZoneKind::Premium,
            range: PriceRange::new(premium_bottom, hi),
            equilibrium_boundary: premium_bottom,
            anchor,
        },
    ]
}

/// Zone containing `price`. Shared boundaries resolve to the lower zone.
pub fn zone_at(zones: &[Zone], price: f64) -> Option<ZoneKind> {
    zones.iter().find(|z| z.range.contains(price)).map(|z| z.kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swing::detect;
    use crate::test_support::from_highs_lows;

    fn swing_range() -> CandleSeries {
        // Peak at 120 (index 2), trough at 100 (index 5).
        from_highs_lows(&[
            (112.0, 110.0),
            (116.0, 113.0),
            (120.0, 117.0),
            (116.0, 110.0),
            (110.0, 104.0),
            (105.0, 100.0),
            (108.0, 103.0),
            (111.0, 106.0),
        ])
    }

    #[test]
    fn zones_split_the_swing_range() {
        let s = swing_range();
        let swings = detect(&s, 2);
        let zones = compute_zones(&s, &swings, &AnalysisConfig::default());
        assert_eq!(zones.len(), 3);

        let discount = &zones[0];
        assert_eq!(discount.kind, ZoneKind::Discount);
        assert_eq!(discount.range.low, 100.0);
        assert!((discount.range.high - 107.64).abs() < 1e-9);

        let premium = &zones[2];
        assert_eq!(premium.kind, ZoneKind::Premium);
        assert!((premium.range.low - 112.36).abs() < 1e-9);
        assert_eq!(premium.range.high, 120.0);

        assert!((zones[1].equilibrium_boundary - 110.0).abs() < 1e-9);
    }

    #[test]
    fn boundary_lies_within_zone() {
        let s = swing_range();
        let swings = detect(&s, 2);
        for zone in compute_zones(&s, &swings, &AnalysisConfig::default()) {
            assert!(zone.range.low <= zone.equilibrium_boundary);
            assert!(zone.equilibrium_boundary <= zone.range.high);
        }
    }

    #[test]
    fn no_swings_no_zones() {
        let s = from_highs_lows(&[(10.0, 9.0), (11.0, 10.0), (12.0, 11.0)]);
        assert!(compute_zones(&s, &[], &AnalysisConfig::default()).is_empty());
    }

    #[test]
    fn price_lookup() {
        let s = swing_range();
        let swings = detect(&s, 2);
        let zones = compute_zones(&s, &swings, &AnalysisConfig::default());
        assert_eq!(zone_at(&zones, 101.0), Some(ZoneKind::Discount));
        assert_eq!(zone_at(&zones, 110.0), Some(ZoneKind::Equilibrium));
        assert_eq!(zone_at(&zones, 119.0), Some(ZoneKind::Premium));
        assert_eq!(zone_at(&zones, 125.0), None);
    }

    /// High 120, low 100, then a lower high at 112 and a higher low at 104.
    fn lower_high_points() -> Vec<(f64, f64)> {
        vec![
            (112.0, 110.0),
            (116.0, 113.0),
            (120.0, 117.0),
            (116.0, 110.0),
            (110.0, 104.0),
            (105.0, 100.0),
            (108.0, 103.0),
            (110.0, 106.0),
            (112.0, 108.0),
            (109.0, 105.0),
            (107.0, 104.5),
            (106.0, 104.0),
            (109.0, 106.0),
            (111.0, 107.0),
        ]
    }

    #[test]
    fn anchor_holds_without_a_break() {
        let s = from_highs_lows(&lower_high_points());
        let swings = detect(&s, 2);
        assert_eq!(swings.len(), 4);
        assert!(breaks(s.candles(), &swings).is_empty());

        let anchor = anchor_range(&s, &swings).unwrap();
        assert_eq!(anchor.broken, None);
        assert_eq!(anchor.range, PriceRange::new(100.0, 120.0));
    }

    #[test]
    fn break_moves_anchor_to_impulse_leg() {
        let mut points = lower_high_points();
        // Closes at 114.5, through the 112 lower high.
        points.push((116.0, 110.0));
        let s = from_highs_lows(&points);
        let swings = detect(&s, 2);

        let anchor = anchor_range(&s, &swings).unwrap();
        assert_eq!(anchor.broken, Some(2));
        assert_eq!(swings[2].price, 112.0);
        assert_eq!(anchor.confirmed_at, 14);
        assert_eq!(anchor.range, PriceRange::new(104.0, 112.0));

        let zones = compute_zones(&s, &swings, &AnalysisConfig::default());
        assert_eq!(zones[0].range.low, 104.0);
        assert_eq!(zones[2].range.high, 112.0);
    }
}
