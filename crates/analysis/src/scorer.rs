use std::fmt;

use serde::{Deserialize, Serialize};

use common::Direction;

use crate::config::AnalysisConfig;
use crate::poi::PointOfInterest;

const WEIGHT_SHARE: f64 = 0.5;
const RSI_SHARE: f64 = 0.3;
const VOLUME_SHARE: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalDirection {
    Long,
    Short,
    None,
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalDirection::Long => write!(f, "LONG"),
            SignalDirection::Short => write!(f, "SHORT"),
            SignalDirection::None => write!(f, "NONE"),
        }
    }
}

impl From<Direction> for SignalDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Bullish => SignalDirection::Long,
            Direction::Bearish => SignalDirection::Short,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeLevels {
    pub entry: f64,
    pub stop: f64,
    pub target: f64,
}

impl TradeLevels {
    pub fn risk(&self) -> f64 {
        (self.entry - self.stop).abs()
    }

    pub fn reward(&self) -> f64 {
        (self.target - self.entry).abs()
    }

    pub fn reward_to_risk(&self) -> f64 {
        if self.risk() > 0.0 {
            self.reward() / self.risk()
        } else {
            0.0
        }
    }
}

/// Scored trade proposal for the current price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub direction: SignalDirection,
    /// In `[0, 1]`; exactly 0 when `direction` is `None`.
    pub confidence: f64,
    /// Present exactly when `direction` is `Long` or `Short`.
    pub levels: Option<TradeLevels>,
    /// Indices into the POI list: the entry POI, then the target POI if any.
    pub supporting_pois: Vec<usize>,
}

impl Signal {
    pub fn none() -> Self {
        Self {
            direction: SignalDirection::None,
            confidence: 0.0,
            levels: None,
            supporting_pois: Vec::new(),
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.direction != SignalDirection::None
    }
}

/// Score the POI at or near `current_price`.
///
/// The highest-weight POI within `poi_tolerance` of the price is the entry
/// POI; ties go to the most recently confirmed. Its direction becomes the
/// signal direction and
/// `confidence = 0.5 * weight + 0.3 * rsi_alignment + 0.2 * volume_alignment`
/// with every term in `[0, 1]`.
pub fn score(
    pois: &[PointOfInterest],
    rsi_latest: Option<f64>,
    volume_zscore_latest: Option<f64>,
    current_price: f64,
    config: &AnalysisConfig,
) -> Signal {
    if !current_price.is_finite() || current_price <= 0.0 {
        return Signal::none();
    }
    let Some(entry_poi) = pois
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_near(current_price, config.poi_tolerance))
        .max_by(|(ia, a), (ib, b)| {
            a.weight
                .cmp(&b.weight)
                .then(a.latest_confirmed_at.cmp(&b.latest_confirmed_at))
                .then(ib.cmp(ia))
        })
        .map(|(i, _)| i)
    else {
        return Signal::none();
    };

    let poi = &pois[entry_poi];
    let direction = SignalDirection::from(poi.direction);
    let confidence = WEIGHT_SHARE * normalized_weight(poi.weight, config)
        + RSI_SHARE * rsi_alignment(direction, rsi_latest, config)
        + VOLUME_SHARE * volume_alignment(volume_zscore_latest, config);

    let (levels, target_poi) = trade_levels(pois, entry_poi, direction, current_price, config);
    let mut supporting_pois = vec![entry_poi];
    supporting_pois.extend(target_poi);

    Signal {
        direction,
        confidence: confidence.clamp(0.0, 1.0),
        levels: Some(levels),
        supporting_pois,
    }
}

/// POI weight mapped to `[0, 1]`, saturating at `poi_weight_saturation`.
pub fn normalized_weight(weight: usize, config: &AnalysisConfig) -> f64 {
    let saturation = config.poi_weight_saturation.max(1) as f64;
    (weight as f64 / saturation).min(1.0)
}

/// 1 when RSI is oversold for a long or overbought for a short, else 0.
/// Undefined RSI contributes 0.
pub fn rsi_alignment(direction: SignalDirection, rsi: Option<f64>, config: &AnalysisConfig) -> f64 {
    let aligned = match (direction, rsi) {
        (SignalDirection::Long, Some(v)) => v <= config.rsi_oversold,
        (SignalDirection::Short, Some(v)) => v >= config.rsi_overbought,
        _ => false,
    };
    if aligned {
        1.0
    } else {
        0.0
    }
}

/// Volume z-score scaled so that `volume_zscore_threshold` maps to 1.
/// Undefined or below-average volume contributes 0.
pub fn volume_alignment(zscore: Option<f64>, config: &AnalysisConfig) -> f64 {
    match zscore {
        Some(z) if z.is_finite() => (z / config.volume_zscore_threshold).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

/// Stop beyond the entry POI by `stop_buffer` percent, target at the near
/// edge of the closest POI on the profitable side, or `risk_reward` times the
/// risk when no such POI exists.
fn trade_levels(
    pois: &[PointOfInterest],
    entry_poi: usize,
    direction: SignalDirection,
    entry: f64,
    config: &AnalysisConfig,
) -> (TradeLevels, Option<usize>) {
    let poi = &pois[entry_poi];
    let buffer = entry * config.stop_buffer / 100.0;
    let others = || pois.iter().enumerate().filter(move |(i, _)| *i != entry_poi);

    match direction {
        SignalDirection::Short => {
            let stop = poi.range.high.max(entry) + buffer;
            let target = others()
                .filter(|(_, p)| p.range.high < entry)
                .max_by(|(_, a), (_, b)| a.range.high.total_cmp(&b.range.high));
            let (target, target_poi) = match target {
                Some((i, p)) => (p.range.high, Some(i)),
                None => (entry - (stop - entry) * config.risk_reward, None),
            };
            (TradeLevels { entry, stop, target }, target_poi)
        }
        _ => {
            let stop = poi.range.low.min(entry) - buffer;
            let target = others()
                .filter(|(_, p)| p.range.low > entry)
                .min_by(|(_, a), (_, b)| a.range.low.total_cmp(&b.range.low));
            let (target, target_poi) = match target {
                Some((i, p)) => (p.range.low, Some(i)),
                None => (entry + (entry - stop) * config.risk_reward, None),
            };
            (TradeLevels { entry, stop, target }, target_poi)
        }
    }
}
