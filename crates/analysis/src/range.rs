use serde::{Deserialize, Serialize};

/// Closed price interval `[low, high]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub low: f64,
    pub high: f64,
}

impl PriceRange {
    /// Interval spanning both prices, in either order.
    pub fn new(a: f64, b: f64) -> Self {
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    pub fn mid(&self) -> f64 {
        (self.low + self.high) / 2.0
    }

    /// Width as a percentage of the lower bound.
    pub fn width_pct(&self) -> f64 {
        if self.low > 0.0 {
            self.width() / self.low * 100.0
        } else {
            f64::INFINITY
        }
    }

    pub fn contains(&self, price: f64) -> bool {
        self.low <= price && price <= self.high
    }

    /// Closed intervals that share at least one point overlap.
    pub fn overlaps(&self, other: &PriceRange) -> bool {
        self.low <= other.high && other.low <= self.high
    }

    pub fn union(&self, other: &PriceRange) -> PriceRange {
        PriceRange {
            low: self.low.min(other.low),
            high: self.high.max(other.high),
        }
    }

    /// Absolute distance from `price` to the interval, zero inside it.
    pub fn distance_to(&self, price: f64) -> f64 {
        if price < self.low {
            self.low - price
        } else if price > self.high {
            price - self.high
        } else {
            0.0
        }
    }
}
