use serde::{Deserialize, Serialize};

use common::{Error, Result, Timeframe};

/// Thresholds for the structure scan and the signal scorer.
///
/// Percentages are expressed in percent (`0.5` means 0.5%), Fibonacci
/// levels as fractions of the anchor range.
///
/// Example `config/analysis.toml`:
/// ```toml
/// [analysis]
/// swing_lookback = 5
/// eqh_eql_tolerance = 0.1
/// rsi_period = 14
/// premium_level = 0.618
/// discount_level = 0.382
/// ```
///
/// A config read from TOML or produced by the builder is validated before it
/// is returned. `Analyzer::new` validates again, so a hand-edited value can
/// never reach a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Bars on each side a swing must dominate.
    pub swing_lookback: usize,
    /// Max distance between equal highs/lows, percent of the lower price.
    pub eqh_eql_tolerance: f64,
    pub sponsored_candle_volume_multiple: f64,
    pub sponsored_candle_range_multiple: f64,
    pub wick_body_ratio_threshold: f64,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub premium_level: f64,
    pub discount_level: f64,
    pub equilibrium_level: f64,
    /// Rolling window for volume z-score and sponsored-candle averages.
    pub volume_window: usize,
    /// Volume z-score at which volume alignment reaches 1.
    pub volume_zscore_threshold: f64,
    /// Bars searched backwards from a break for its order block.
    pub order_block_lookback: usize,
    /// Bars after a swing within which a sweep of it counts as an SFP.
    pub sfp_window: usize,
    /// Largest wick excursion beyond the swing, percent, still "marginal".
    pub sfp_max_excursion: f64,
    /// Only events confirmed within this many trailing bars form POIs.
    pub poi_lookback: usize,
    /// Greedy POI merging stops before a cluster grows wider than this, percent.
    pub poi_max_width: f64,
    /// Distance from a POI, percent of price, still treated as adjacent.
    pub poi_tolerance: f64,
    /// POI weight that maps to a normalised weight of 1.
    pub poi_weight_saturation: usize,
    /// Extra distance beyond the POI boundary for the stop, percent of entry.
    pub stop_buffer: f64,
    /// Reward-to-risk multiple used when no POI lies in the target direction.
    pub risk_reward: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            swing_lookback: 5,
            eqh_eql_tolerance: 0.1,
            sponsored_candle_volume_multiple: 1.5,
            sponsored_candle_range_multiple: 1.5,
            wick_body_ratio_threshold: 2.0,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            premium_level: 0.618,
            discount_level: 0.382,
            equilibrium_level: 0.5,
            volume_window: 20,
            volume_zscore_threshold: 1.0,
            order_block_lookback: 5,
            sfp_window: 10,
            sfp_max_excursion: 1.0,
            poi_lookback: 150,
            poi_max_width: 2.0,
            poi_tolerance: 0.5,
            poi_weight_saturation: 5,
            stop_buffer: 0.1,
            risk_reward: 2.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AnalysisFile {
    #[serde(default)]
    analysis: AnalysisConfig,
}

impl AnalysisConfig {
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Parse the `[analysis]` table of a TOML document. Missing keys take
    /// their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: AnalysisFile = toml::from_str(content)
            .map_err(|e| Error::InvalidConfiguration(format!("analysis config: {e}")))?;
        file.analysis.validate()?;
        Ok(file.analysis)
    }

    /// Load from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfiguration(format!("failed to read analysis config at '{path}': {e}"))
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject contradictory or out-of-range settings.
    pub fn validate(&self) -> Result<()> {
        check(self.swing_lookback >= 1, "swing_lookback must be at least 1")?;
        check(
            self.eqh_eql_tolerance.is_finite()
                && self.eqh_eql_tolerance >= 0.0
                && self.eqh_eql_tolerance < 100.0,
            "eqh_eql_tolerance must be a percentage in [0, 100)",
        )?;
        check(
            positive(self.sponsored_candle_volume_multiple),
            "sponsored_candle_volume_multiple must be positive",
        )?;
        check(
            positive(self.sponsored_candle_range_multiple),
            "sponsored_candle_range_multiple must be positive",
        )?;
        check(
            positive(self.wick_body_ratio_threshold),
            "wick_body_ratio_threshold must be positive",
        )?;
        check(self.rsi_period >= 2, "rsi_period must be at least 2")?;
        check(
            positive(self.rsi_oversold)
                && self.rsi_overbought.is_finite()
                && self.rsi_oversold < self.rsi_overbought
                && self.rsi_overbought < 100.0,
            "RSI thresholds must satisfy 0 < rsi_oversold < rsi_overbought < 100",
        )?;
        check(
            [self.discount_level, self.equilibrium_level, self.premium_level]
                .iter()
                .all(|v| v.is_finite()),
            "zone levels must be finite",
        )?;
        check(
            0.0 < self.discount_level
                && self.discount_level < self.equilibrium_level
                && self.equilibrium_level < self.premium_level
                && self.premium_level < 1.0,
            "zone levels must satisfy 0 < discount_level < equilibrium_level < premium_level < 1",
        )?;
        check(self.volume_window >= 2, "volume_window must be at least 2")?;
        check(
            positive(self.volume_zscore_threshold),
            "volume_zscore_threshold must be positive",
        )?;
        check(self.order_block_lookback >= 1, "order_block_lookback must be at least 1")?;
        check(self.sfp_window >= 1, "sfp_window must be at least 1")?;
        check(positive(self.sfp_max_excursion), "sfp_max_excursion must be positive")?;
        check(self.poi_lookback >= 1, "poi_lookback must be at least 1")?;
        check(positive(self.poi_max_width), "poi_max_width must be positive")?;
        check(
            self.poi_tolerance.is_finite() && self.poi_tolerance >= 0.0,
            "poi_tolerance must not be negative",
        )?;
        check(self.poi_weight_saturation >= 1, "poi_weight_saturation must be at least 1")?;
        check(positive(self.stop_buffer), "stop_buffer must be positive")?;
        check(positive(self.risk_reward), "risk_reward must be positive")?;
        Ok(())
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn check(ok: bool, message: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidConfiguration(message.to_string()))
    }
}

/// Fluent construction of a validated `AnalysisConfig`.
#[derive(Debug, Clone, Default)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    /// Defaults with the swing lookback suited to `timeframe`.
    pub fn for_timeframe(timeframe: Timeframe) -> Self {
        Self::default().swing_lookback(timeframe.default_swing_lookback())
    }

    /// Start from an existing config, e.g. one loaded from a file.
    pub fn from_config(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn swing_lookback(mut self, bars: usize) -> Self {
        self.config.swing_lookback = bars;
        self
    }

    pub fn eqh_eql_tolerance(mut self, percent: f64) -> Self {
        self.config.eqh_eql_tolerance = percent;
        self
    }

    pub fn sponsored_candle_volume_multiple(mut self, multiple: f64) -> Self {
        self.config.sponsored_candle_volume_multiple = multiple;
        self
    }

    pub fn wick_body_ratio_threshold(mut self, ratio: f64) -> Self {
        self.config.wick_body_ratio_threshold = ratio;
        self
    }

    pub fn rsi(mut self, period: usize, overbought: f64, oversold: f64) -> Self {
        self.config.rsi_period = period;
        self.config.rsi_overbought = overbought;
        self.config.rsi_oversold = oversold;
        self
    }

    pub fn zone_levels(mut self, discount: f64, equilibrium: f64, premium: f64) -> Self {
        self.config.discount_level = discount;
        self.config.equilibrium_level = equilibrium;
        self.config.premium_level = premium;
        self
    }

    pub fn volume_window(mut self, bars: usize) -> Self {
        self.config.volume_window = bars;
        self
    }

    pub fn poi_tolerance(mut self, percent: f64) -> Self {
        self.config.poi_tolerance = percent;
        self
    }

    pub fn risk_reward(mut self, multiple: f64) -> Self {
        self.config.risk_reward = multiple;
        self
    }

    pub fn build(self) -> Result<AnalysisConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn discount_above_premium_is_rejected() {
        let err = AnalysisConfig::builder()
            .zone_levels(0.7, 0.5, 0.6)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn discount_equal_to_premium_is_rejected() {
        assert!(AnalysisConfig::builder()
            .zone_levels(0.5, 0.5, 0.5)
            .build()
            .is_err());
    }

    #[test]
    fn non_positive_periods_are_rejected() {
        assert!(AnalysisConfig::builder().swing_lookback(0).build().is_err());
        assert!(AnalysisConfig::builder().rsi(0, 70.0, 30.0).build().is_err());
        assert!(AnalysisConfig::builder().volume_window(0).build().is_err());
    }

    #[test]
    fn inverted_rsi_thresholds_are_rejected() {
        assert!(AnalysisConfig::builder().rsi(14, 30.0, 70.0).build().is_err());
    }

    #[test]
    fn timeframe_sets_lookback() {
        let cfg = AnalysisConfigBuilder::for_timeframe(Timeframe::D1)
            .build()
            .unwrap();
        assert_eq!(cfg.swing_lookback, 3);
    }

    #[test]
    fn toml_overrides_and_defaults() {
        let cfg = AnalysisConfig::from_toml_str(
            r#"
            [analysis]
            swing_lookback = 3
            eqh_eql_tolerance = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.swing_lookback, 3);
        assert_eq!(cfg.eqh_eql_tolerance, 0.5);
        assert_eq!(cfg.rsi_period, 14);
    }

    #[test]
    fn toml_with_bad_levels_fails_at_load() {
        let err = AnalysisConfig::from_toml_str(
            r#"
            [analysis]
            discount_level = 0.7
            premium_level = 0.6
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn empty_toml_gives_defaults() {
        assert_eq!(
            AnalysisConfig::from_toml_str("").unwrap(),
            AnalysisConfig::default()
        );
    }
}
