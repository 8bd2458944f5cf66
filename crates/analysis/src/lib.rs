pub mod config;
pub mod context;
pub mod indicators;
pub mod pipeline;
pub mod poi;
pub mod range;
pub mod scorer;
pub mod structure;
pub mod swing;
pub mod zones;

#[cfg(test)]
mod test_support;

pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use context::{IndicatorSnapshot, MarketContext, Trend};
pub use pipeline::{Analysis, Analyzer, AnalyzerSet};
pub use poi::{compute_poi, PointOfInterest};
pub use range::PriceRange;
pub use scorer::{score, Signal, SignalDirection, TradeLevels};
pub use structure::{classify, StructureEvent, StructureKind, StructureTag};
pub use swing::{detect, SwingId, SwingKind, SwingPoint};
pub use zones::{compute_zones, Zone, ZoneKind};
