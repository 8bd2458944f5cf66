use crate::{Error, Result, Timeframe};

const DEFAULT_BINANCE_BASE_URL: &str = "https://api.binance.com";

/// Process-level settings loaded from environment variables at startup.
///
/// Every variable is optional. Analysis thresholds live in a separate TOML
/// file pointed to by `ANALYSIS_CONFIG_PATH`.
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<i64>,

    // Market data
    pub binance_base_url: String,
    pub default_symbol: String,
    pub default_timeframe: Timeframe,
    pub default_limit: usize,

    // Analysis thresholds file
    pub analysis_config_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram_token: None,
            telegram_chat_id: None,
            binance_base_url: DEFAULT_BINANCE_BASE_URL.to_string(),
            default_symbol: "BTC/USDT".to_string(),
            default_timeframe: Timeframe::H4,
            default_limit: 500,
            analysis_config_path: None,
        }
    }
}

impl Config {
    /// Load configuration from the environment. Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        let defaults = Config::default();

        let telegram_chat_id = optional_env("TELEGRAM_CHAT_ID")
            .map(|v| {
                v.trim().parse::<i64>().map_err(|_| {
                    Error::InvalidConfiguration(format!(
                        "TELEGRAM_CHAT_ID must be numeric, got '{v}'"
                    ))
                })
            })
            .transpose()?;

        let default_timeframe = match optional_env("DEFAULT_TIMEFRAME") {
            Some(v) => v.parse()?,
            None => defaults.default_timeframe,
        };

        let default_limit = match optional_env("DEFAULT_LIMIT") {
            Some(v) => v.trim().parse::<usize>().map_err(|_| {
                Error::InvalidConfiguration(format!("DEFAULT_LIMIT must be a count, got '{v}'"))
            })?,
            None => defaults.default_limit,
        };

        Ok(Config {
            telegram_token: optional_env("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id,
            binance_base_url: optional_env("BINANCE_BASE_URL")
                .unwrap_or(defaults.binance_base_url),
            default_symbol: optional_env("DEFAULT_SYMBOL").unwrap_or(defaults.default_symbol),
            default_timeframe,
            default_limit,
            analysis_config_path: optional_env("ANALYSIS_CONFIG_PATH"),
        })
    }

    /// Token and chat id, when both are present.
    pub fn telegram(&self) -> Option<(&str, i64)> {
        match (&self.telegram_token, self.telegram_chat_id) {
            (Some(token), Some(chat_id)) => Some((token.as_str(), chat_id)),
            _ => None,
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
