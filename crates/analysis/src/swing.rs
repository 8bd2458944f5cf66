use serde::{Deserialize, Serialize};

use common::{Candle, CandleSeries};

/// Position of a swing in the vector returned by [`detect`].
pub type SwingId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwingKind {
    High,
    Low,
}

/// Local extreme confirmed by `lookback` bars on each side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    pub index: usize,
    pub price: f64,
    pub kind: SwingKind,
    /// Bars on the weaker side over which the extreme still dominates.
    /// Never less than the lookback it was detected with.
    pub strength: usize,
    /// First bar at which the swing is known: `index + lookback`.
    pub confirmed_at: usize,
}

/// All swings of `series`, ordered by index with a high before a low on the
/// same bar.
pub fn detect(series: &CandleSeries, lookback: usize) -> Vec<SwingPoint> {
    swings(series, lookback).collect()
}

/// Lazy form of [`detect`].
///
/// A bar is a swing high when its high is at least every high in the
/// `lookback` bars before it and strictly above every high in the `lookback`
/// bars after it, so in a run of equal highs the last one wins. Lows mirror
/// this. Fewer than `2 * lookback + 1` candles, or a zero lookback, yields
/// nothing.
pub fn swings(series: &CandleSeries, lookback: usize) -> Swings<'_> {
    Swings {
        candles: series.candles(),
        lookback,
        next: lookback,
        pending: None,
    }
}

#[derive(Debug, Clone)]
pub struct Swings<'a> {
    candles: &'a [Candle],
    lookback: usize,
    next: usize,
    pending: Option<SwingPoint>,
}

impl Swings<'_> {
    fn high_at(&self, i: usize) -> Option<SwingPoint> {
        let k = self.lookback;
        let h = self.candles[i].high;
        let left = self.candles[i - k..i].iter().all(|c| c.high <= h);
        let right = self.candles[i + 1..=i + k].iter().all(|c| c.high < h);
        if !(left && right) {
            return None;
        }
        let left_ext = self.candles[..i]
            .iter()
            .rev()
            .take_while(|c| c.high <= h)
            .count();
        let right_ext = self.candles[i + 1..]
            .iter()
            .take_while(|c| c.high < h)
            .count();
        Some(self.point(i, h, SwingKind::High, left_ext.min(right_ext)))
    }

    fn low_at(&self, i: usize) -> Option<SwingPoint> {
        let k = self.lookback;
        let l = self.candles[i].low;
        let left = self.candles[i - k..i].iter().all(|c| c.low >= l);
        let right = self.candles[i + 1..=i + k].iter().all(|c| c.low > l);
        if !(left && right) {
            return None;
        }
        let left_ext = self.candles[..i]
            .iter()
            .rev()
            .take_while(|c| c.low >= l)
            .count();
        let right_ext = self.candles[i + 1..]
            .iter()
            .take_while(|c| c.low > l)
            .count();
        Some(self.point(i, l, SwingKind::Low, left_ext.min(right_ext)))
    }

    fn point(&self, index: usize, price: f64, kind: SwingKind, strength: usize) -> SwingPoint {
        SwingPoint {
            index,
            price,
            kind,
            strength,
            confirmed_at: index + self.lookback,
        }
    }
}

impl Iterator for Swings<'_> {
    type Item = SwingPoint;

    fn next(&mut self) -> Option<SwingPoint> {
        if let Some(low) = self.pending.take() {
            return Some(low);
        }
        if self.lookback == 0 {
            return None;
        }
        while self.next + self.lookback < self.candles.len() {
            let i = self.next;
            self.next += 1;
            match (self.high_at(i), self.low_at(i)) {
                (Some(high), low) => {
                    self.pending = low;
                    return Some(high);
                }
                (None, Some(low)) => return Some(low),
                (None, None) => {}
            }
        }
        None
    }
}
