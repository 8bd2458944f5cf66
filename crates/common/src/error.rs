use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Contradictory or out-of-range settings. Raised while building a config,
    /// never during analysis.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The candle sequence violates an ordering or value invariant.
    #[error("Malformed series at candle {index}: {reason}")]
    MalformedSeries { index: usize, reason: String },

    /// The market data provider could not supply candles.
    #[error("Market data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Exchange API error: {0}")]
    Exchange(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn malformed(index: usize, reason: impl Into<String>) -> Self {
        Error::MalformedSeries {
            index,
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
