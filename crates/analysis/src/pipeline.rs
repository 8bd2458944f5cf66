use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use common::{Candle, CandleSeries, Result, Timeframe};

use crate::config::{AnalysisConfig, AnalysisConfigBuilder};
use crate::context::{
    market_context, IndicatorSnapshot, MarketContext, TREND_FAST_PERIOD, TREND_SLOW_PERIOD,
};
use crate::indicators::{ema, rsi, volume_zscore};
use crate::poi::{compute_poi, PointOfInterest};
use crate::scorer::{score, Signal};
use crate::structure::{classify, StructureEvent, StructureTag};
use crate::swing::{detect, SwingPoint};
use crate::zones::{compute_zones, Zone};

/// Everything derived from one candle series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub swings: Vec<SwingPoint>,
    pub events: Vec<StructureEvent>,
    pub zones: Vec<Zone>,
    /// POIs built from events confirmed within `poi_lookback` bars. Their
    /// `events` index into `Analysis::events`.
    pub pois: Vec<PointOfInterest>,
    pub indicators: IndicatorSnapshot,
    pub context: Option<MarketContext>,
    pub signal: Signal,
}

impl Analysis {
    /// Number of events per tag.
    pub fn event_counts(&self) -> BTreeMap<StructureTag, usize> {
        let mut counts = BTreeMap::new();
        for event in &self.events {
            *counts.entry(event.tag()).or_insert(0) += 1;
        }
        counts
    }
}

/// Runs the full scan with one validated configuration.
///
/// Pure: the same series and config always give the same `Analysis`, and no
/// value depends on a candle after the last one in the series.
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Validate raw candles, then analyse them.
    pub fn analyze_candles(&self, candles: Vec<Candle>) -> Result<Analysis> {
        let series = CandleSeries::new(candles)?;
        Ok(self.analyze(&series))
    }

    pub fn analyze(&self, series: &CandleSeries) -> Analysis {
        let config = &self.config;

        let swings = detect(series, config.swing_lookback);
        let events = classify(series, &swings, config);
        let zones = compute_zones(series, &swings, config);

        // Events are sorted by confirmation, so the recent ones are a suffix.
        let cutoff = series.len().saturating_sub(config.poi_lookback);
        let offset = events.partition_point(|e| e.confirmed_at < cutoff);
        let mut pois = compute_poi(&events[offset..], &zones, config);
        for poi in &mut pois {
            for id in &mut poi.events {
                *id += offset;
            }
        }

        let closes = series.closes();
        let indicators = IndicatorSnapshot {
            rsi: latest(rsi(series, config.rsi_period)),
            volume_zscore: latest(volume_zscore(series, config.volume_window)),
            ema_fast: latest(ema(&closes, TREND_FAST_PERIOD)),
            ema_slow: latest(ema(&closes, TREND_SLOW_PERIOD)),
        };

        let context = market_context(series, &swings, &events, &zones, &indicators, config);
        let signal = match series.last() {
            Some(last) => score(
                &pois,
                indicators.rsi,
                indicators.volume_zscore,
                last.close,
                config,
            ),
            None => Signal::none(),
        };

        debug!(
            candles = series.len(),
            swings = swings.len(),
            events = events.len(),
            pois = pois.len(),
            direction = %signal.direction,
            confidence = signal.confidence,
            "Analysis complete"
        );

        Analysis {
            swings,
            events,
            zones,
            pois,
            indicators,
            context,
            signal,
        }
    }
}

/// Analyzers keyed by timeframe. Timeframes without their own analyzer use
/// the fallback.
#[derive(Debug, Clone)]
pub struct AnalyzerSet {
    by_timeframe: BTreeMap<Timeframe, Arc<Analyzer>>,
    fallback: Arc<Analyzer>,
}

impl AnalyzerSet {
    /// The same analyzer for every timeframe, e.g. one built from a file.
    pub fn uniform(analyzer: Analyzer) -> Self {
        Self {
            by_timeframe: BTreeMap::new(),
            fallback: Arc::new(analyzer),
        }
    }

    /// Default thresholds with the swing lookback of each timeframe.
    pub fn per_timeframe(timeframes: impl IntoIterator<Item = Timeframe>) -> Result<Self> {
        let mut set = Self::uniform(Analyzer::new(AnalysisConfig::default())?);
        for timeframe in timeframes {
            let config = AnalysisConfigBuilder::for_timeframe(timeframe).build()?;
            set.insert(timeframe, Analyzer::new(config)?);
        }
        Ok(set)
    }

    pub fn insert(&mut self, timeframe: Timeframe, analyzer: Analyzer) {
        self.by_timeframe.insert(timeframe, Arc::new(analyzer));
    }

    pub fn get(&self, timeframe: Timeframe) -> Arc<Analyzer> {
        self.by_timeframe
            .get(&timeframe)
            .unwrap_or(&self.fallback)
            .clone()
    }
}

impl From<Analyzer> for AnalyzerSet {
    fn from(analyzer: Analyzer) -> Self {
        Self::uniform(analyzer)
    }
}

fn latest(values: Vec<Option<f64>>) -> Option<f64> {
    values.last().copied().flatten()
}
