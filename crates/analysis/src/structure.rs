use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use common::{Candle, CandleSeries, Direction};

use crate::config::AnalysisConfig;
use crate::range::PriceRange;
use crate::swing::{SwingId, SwingKind, SwingPoint};

/// Minimum body, as a fraction of range, used as the wick ratio denominator
/// so dojis do not divide by zero.
const MIN_BODY_FRACTION: f64 = 0.1;

/// What a structure event is, with the data specific to that kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructureKind {
    /// Break of structure: a close beyond the last swing, with the trend.
    Bos { level: f64, broken: SwingId },
    /// Break of market structure: the first break against the trend.
    Bms { level: f64, broken: SwingId },
    EqualHighs { members: Vec<SwingId> },
    EqualLows { members: Vec<SwingId> },
    /// Last opposite-coloured candle before a break.
    OrderBlock { candle: usize, broken: SwingId },
    SponsoredCandle {
        candle: usize,
        turning_point: SwingId,
        range_ratio: f64,
        volume_ratio: f64,
    },
    Wick { candle: usize, wick_body_ratio: f64 },
    /// Swing failure pattern: a wick through a swing that closes back inside.
    Sfp {
        swept: SwingId,
        sweep_candle: usize,
        extreme: f64,
    },
}

/// Short label of a [`StructureKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StructureTag {
    #[serde(rename = "BOS")]
    Bos,
    #[serde(rename = "BMS")]
    Bms,
    #[serde(rename = "EQH")]
    EqualHighs,
    #[serde(rename = "EQL")]
    EqualLows,
    #[serde(rename = "OB")]
    OrderBlock,
    #[serde(rename = "SC")]
    SponsoredCandle,
    #[serde(rename = "WICK")]
    Wick,
    #[serde(rename = "SFP")]
    Sfp,
}

impl StructureTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            StructureTag::Bos => "BOS",
            StructureTag::Bms => "BMS",
            StructureTag::EqualHighs => "EQH",
            StructureTag::EqualLows => "EQL",
            StructureTag::OrderBlock => "OB",
            StructureTag::SponsoredCandle => "SC",
            StructureTag::Wick => "WICK",
            StructureTag::Sfp => "SFP",
        }
    }
}

impl fmt::Display for StructureTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureEvent {
    pub kind: StructureKind,
    pub direction: Direction,
    pub range: PriceRange,
    /// Bar at which every input to the event was known.
    pub confirmed_at: usize,
}

impl StructureEvent {
    pub fn tag(&self) -> StructureTag {
        match self.kind {
            StructureKind::Bos { .. } => StructureTag::Bos,
            StructureKind::Bms { .. } => StructureTag::Bms,
            StructureKind::EqualHighs { .. } => StructureTag::EqualHighs,
            StructureKind::EqualLows { .. } => StructureTag::EqualLows,
            StructureKind::OrderBlock { .. } => StructureTag::OrderBlock,
            StructureKind::SponsoredCandle { .. } => StructureTag::SponsoredCandle,
            StructureKind::Wick { .. } => StructureTag::Wick,
            StructureKind::Sfp { .. } => StructureTag::Sfp,
        }
    }

    /// Swings this event was derived from. Empty for pure candle patterns.
    pub fn origins(&self) -> Vec<SwingId> {
        match &self.kind {
            StructureKind::Bos { broken, .. }
            | StructureKind::Bms { broken, .. }
            | StructureKind::OrderBlock { broken, .. } => vec![*broken],
            StructureKind::EqualHighs { members } | StructureKind::EqualLows { members } => {
                members.clone()
            }
            StructureKind::SponsoredCandle { turning_point, .. } => vec![*turning_point],
            StructureKind::Sfp { swept, .. } => vec![*swept],
            StructureKind::Wick { .. } => Vec::new(),
        }
    }
}

/// Run every pattern pass over `series` and its `swings`.
///
/// Events come back ordered by `confirmed_at`. Events confirmed on the same
/// bar keep pass order: breaks with their order blocks, equal highs, equal
/// lows, sponsored candles, wicks, then swing failures.
pub fn classify(
    series: &CandleSeries,
    swings: &[SwingPoint],
    config: &AnalysisConfig,
) -> Vec<StructureEvent> {
    let candles = series.candles();
    let mut events = Vec::new();

    let mut seen_blocks = HashSet::new();
    for brk in breaks(candles, swings) {
        let block = order_block(candles, &brk, config.order_block_lookback)
            .filter(|ob| seen_blocks.insert(block_key(ob)));
        events.push(brk);
        events.extend(block);
    }
    events.extend(equal_levels(swings, SwingKind::High, config.eqh_eql_tolerance));
    events.extend(equal_levels(swings, SwingKind::Low, config.eqh_eql_tolerance));
    events.extend(sponsored_candles(candles, swings, config));
    events.extend(wicks(candles, config.wick_body_ratio_threshold));
    events.extend(swing_failures(candles, swings, config));

    events.sort_by_key(|e| e.confirmed_at);
    events
}

/// Whether two prices are equal within `tolerance_pct` percent of the lower.
/// Symmetric in its price arguments.
pub fn within_tolerance(a: f64, b: f64, tolerance_pct: f64) -> bool {
    (a - b).abs() <= a.min(b) * tolerance_pct / 100.0
}

// ─── Breaks ───────────────────────────────────────────────────────────────────

/// Closes beyond the most recent confirmed swing on each side.
///
/// A swing becomes the reference level on its confirmation bar and can be
/// broken once. The first break sets the trend; a break in the trend
/// direction is a BOS, one against it a BMS that flips the trend.
pub(crate) fn breaks(candles: &[Candle], swings: &[SwingPoint]) -> Vec<StructureEvent> {
    let mut activation: Vec<SwingId> = (0..swings.len()).collect();
    activation.sort_by_key(|&id| swings[id].confirmed_at);
    let mut pending = activation.into_iter().peekable();

    let mut last_high: Option<SwingId> = None;
    let mut last_low: Option<SwingId> = None;
    let mut trend: Option<Direction> = None;
    let mut out = Vec::new();

    for (i, candle) in candles.iter().enumerate() {
        while let Some(id) = pending.next_if(|&id| swings[id].confirmed_at <= i) {
            match swings[id].kind {
                SwingKind::High => last_high = Some(id),
                SwingKind::Low => last_low = Some(id),
            }
        }

        if let Some(id) = last_high {
            if candle.close > swings[id].price {
                out.push(break_event(&mut trend, Direction::Bullish, id, &swings[id], i, candle));
                last_high = None;
            }
        }
        if let Some(id) = last_low {
            if candle.close < swings[id].price {
                out.push(break_event(&mut trend, Direction::Bearish, id, &swings[id], i, candle));
                last_low = None;
            }
        }
    }
    out
}

fn break_event(
    trend: &mut Option<Direction>,
    direction: Direction,
    id: SwingId,
    swing: &SwingPoint,
    index: usize,
    candle: &Candle,
) -> StructureEvent {
    let level = swing.price;
    let kind = match *trend {
        Some(current) if current != direction => StructureKind::Bms { level, broken: id },
        _ => StructureKind::Bos { level, broken: id },
    };
    *trend = Some(direction);
    StructureEvent {
        kind,
        direction,
        range: PriceRange::new(level, candle.close),
        confirmed_at: index,
    }
}

// ─── Order blocks ─────────────────────────────────────────────────────────────

fn order_block(candles: &[Candle], brk: &StructureEvent, lookback: usize) -> Option<StructureEvent> {
    let broken = match brk.kind {
        StructureKind::Bos { broken, .. } | StructureKind::Bms { broken, .. } => broken,
        _ => return None,
    };
    let end = brk.confirmed_at;
    let start = end.saturating_sub(lookback);
    let wanted = brk.direction.opposite();
    (start..end)
        .rev()
        .find(|&j| candles[j].direction() == Some(wanted))
        .map(|j| StructureEvent {
            kind: StructureKind::OrderBlock { candle: j, broken },
            direction: brk.direction,
            range: PriceRange::new(candles[j].low, candles[j].high),
            confirmed_at: end,
        })
}

fn block_key(event: &StructureEvent) -> (usize, Direction) {
    match event.kind {
        StructureKind::OrderBlock { candle, .. } => (candle, event.direction),
        _ => (usize::MAX, event.direction),
    }
}

// ─── Equal highs / lows ───────────────────────────────────────────────────────

/// Groups consecutive same-kind swings whose prices are all pairwise within
/// tolerance. Groups of two or more become events.
fn equal_levels(swings: &[SwingPoint], kind: SwingKind, tolerance_pct: f64) -> Vec<StructureEvent> {
    let mut out = Vec::new();
    let mut group: Vec<SwingId> = Vec::new();

    for (id, swing) in swings.iter().enumerate().filter(|(_, s)| s.kind == kind) {
        let fits = group
            .iter()
            .all(|&g| within_tolerance(swings[g].price, swing.price, tolerance_pct));
        if !fits {
            out.extend(equal_group(swings, kind, std::mem::take(&mut group)));
        }
        group.push(id);
    }
    out.extend(equal_group(swings, kind, group));
    out
}

fn equal_group(swings: &[SwingPoint], kind: SwingKind, members: Vec<SwingId>) -> Option<StructureEvent> {
    if members.len() < 2 {
        return None;
    }
    let low = members.iter().map(|&m| swings[m].price).fold(f64::INFINITY, f64::min);
    let high = members.iter().map(|&m| swings[m].price).fold(f64::NEG_INFINITY, f64::max);
    let confirmed_at = members.iter().map(|&m| swings[m].confirmed_at).max().unwrap_or(0);
    // Resting liquidity above equal highs is a magnet for a move down.
    let (kind, direction) = match kind {
        SwingKind::High => (StructureKind::EqualHighs { members }, Direction::Bearish),
        SwingKind::Low => (StructureKind::EqualLows { members }, Direction::Bullish),
    };
    Some(StructureEvent {
        kind,
        direction,
        range: PriceRange { low, high },
        confirmed_at,
    })
}

// ─── Sponsored candles ────────────────────────────────────────────────────────

/// Wide, heavy candles leaving a fresh swing in the direction away from it.
fn sponsored_candles(
    candles: &[Candle],
    swings: &[SwingPoint],
    config: &AnalysisConfig,
) -> Vec<StructureEvent> {
    let window = config.volume_window;
    let mut out = Vec::new();
    if window == 0 {
        return out;
    }

    for i in window..candles.len() {
        let candle = &candles[i];
        let prior = &candles[i - window..i];
        let avg_range = prior.iter().map(Candle::range).sum::<f64>() / window as f64;
        let avg_volume = prior.iter().map(|c| c.volume).sum::<f64>() / window as f64;
        if avg_range <= 0.0 || avg_volume <= 0.0 {
            continue;
        }
        let range_ratio = candle.range() / avg_range;
        let volume_ratio = candle.volume / avg_volume;
        if range_ratio <= config.sponsored_candle_range_multiple
            || volume_ratio <= config.sponsored_candle_volume_multiple
        {
            continue;
        }
        let Some(direction) = candle.direction() else {
            continue;
        };
        let turning_kind = match direction {
            Direction::Bullish => SwingKind::Low,
            Direction::Bearish => SwingKind::High,
        };
        let turning = swings.iter().enumerate().rev().find(|(_, s)| {
            s.kind == turning_kind && s.index <= i && i - s.index <= config.swing_lookback
        });
        if let Some((id, swing)) = turning {
            out.push(StructureEvent {
                kind: StructureKind::SponsoredCandle {
                    candle: i,
                    turning_point: id,
                    range_ratio,
                    volume_ratio,
                },
                direction,
                range: PriceRange::new(candle.low, candle.high),
                confirmed_at: i.max(swing.confirmed_at),
            });
        }
    }
    out
}

// ─── Wicks ────────────────────────────────────────────────────────────────────

fn wicks(candles: &[Candle], threshold: f64) -> Vec<StructureEvent> {
    let mut out = Vec::new();
    for (i, candle) in candles.iter().enumerate() {
        let range = candle.range();
        if range <= 0.0 {
            continue;
        }
        let body = candle.body().max(range * MIN_BODY_FRACTION);
        let top = candle.open.max(candle.close);
        let bottom = candle.open.min(candle.close);

        let upper = candle.upper_wick() / body;
        if upper > threshold {
            out.push(StructureEvent {
                kind: StructureKind::Wick {
                    candle: i,
                    wick_body_ratio: upper,
                },
                direction: Direction::Bearish,
                range: PriceRange::new(top, candle.high),
                confirmed_at: i,
            });
        }
        let lower = candle.lower_wick() / body;
        if lower > threshold {
            out.push(StructureEvent {
                kind: StructureKind::Wick {
                    candle: i,
                    wick_body_ratio: lower,
                },
                direction: Direction::Bullish,
                range: PriceRange::new(candle.low, bottom),
                confirmed_at: i,
            });
        }
    }
    out
}

// ─── Swing failures ───────────────────────────────────────────────────────────

/// The first candle within `sfp_window` bars to trade through a swing decides
/// it. A close through the level is a break, not a failure. A marginal wick
/// through it that closes back inside, followed on the same or the next bar
/// by an opposite close, is an SFP.
fn swing_failures(
    candles: &[Candle],
    swings: &[SwingPoint],
    config: &AnalysisConfig,
) -> Vec<StructureEvent> {
    let mut out = Vec::new();
    for (id, swing) in swings.iter().enumerate() {
        let level = swing.price;
        let last = (swing.index + config.sfp_window).min(candles.len().saturating_sub(1));
        for j in swing.index + 1..=last {
            let c = &candles[j];
            let (pierced, closed_through, extreme, reversal) = match swing.kind {
                SwingKind::High => (c.high > level, c.close > level, c.high, Direction::Bearish),
                SwingKind::Low => (c.low < level, c.close < level, c.low, Direction::Bullish),
            };
            if closed_through {
                break;
            }
            if !pierced {
                continue;
            }
            let excursion = (extreme - level).abs() / level * 100.0;
            if excursion <= config.sfp_max_excursion {
                let confirm = [j, j + 1]
                    .into_iter()
                    .find(|&k| candles.get(k).and_then(Candle::direction) == Some(reversal));
                if let Some(k) = confirm {
                    out.push(StructureEvent {
                        kind: StructureKind::Sfp {
                            swept: id,
                            sweep_candle: j,
                            extreme,
                        },
                        direction: reversal,
                        range: PriceRange::new(level, extreme),
                        confirmed_at: k.max(swing.confirmed_at),
                    });
                }
            }
            break;
        }
    }
    out
}
