//! Application configuration.

use movewatch_core::{SymbolSet, Timeframe};
use movewatch_engine::{DedupConfig, SignificanceConfig, SimilarityConfig};
use movewatch_feeds::{BybitMarket, BybitRestFetcher, FetcherConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },
    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Missing environment variable {0}")]
    MissingEnv(&'static str),
    #[error("Invalid chat id: {0}")]
    InvalidChatId(String),
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Upper bound for every interval and delay setting (one year).
pub const MAX_PERIOD_SECS: u64 = 365 * 24 * 60 * 60;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Tracked symbols, in keyboard order.
    pub symbols: SymbolSet,
    /// Candle timeframe.
    pub timeframe: Timeframe,
    /// Minimum absolute percent change for an alert.
    pub min_percent_change: f64,
    /// Bars requested per fetch.
    pub candle_limit: u32,
    /// Seconds between scheduled passes.
    pub poll_interval_secs: u64,
    /// Seconds before the first scheduled pass.
    pub first_poll_delay_secs: u64,
    /// Cooldown between similar alerts for one symbol.
    pub min_message_interval_secs: u64,
    /// Similarity thresholds.
    pub similarity: SimilaritySettings,
    /// Per-request timeout for market data.
    pub request_timeout_secs: u64,
    /// Edit the previous alert for a symbol instead of sending a new one.
    pub edit_previous: bool,
    /// Logging level.
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            symbols: SymbolSet::default(),
            timeframe: Timeframe::default(),
            min_percent_change: 1.67,
            candle_limit: 200,
            poll_interval_secs: 30,
            first_poll_delay_secs: 10,
            min_message_interval_secs: 300,
            similarity: SimilaritySettings::default(),
            request_timeout_secs: 10,
            edit_previous: true,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the bot cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(invalid("symbols", "at least one symbol is required"));
        }
        if let Some(name) = self.symbols.first_duplicate() {
            return Err(invalid("symbols", format!("duplicate symbol {}", name)));
        }
        for symbol in &self.symbols {
            BybitMarket::resolve(&symbol.instrument)
                .map_err(|e| invalid("symbols", e.to_string()))?;
        }
        if !self.min_percent_change.is_finite() || self.min_percent_change <= 0.0 {
            return Err(invalid("min_percent_change", "must be a positive number"));
        }
        if self.candle_limit == 0 || self.candle_limit > BybitRestFetcher::MAX_LIMIT {
            return Err(invalid(
                "candle_limit",
                format!("must be between 1 and {}", BybitRestFetcher::MAX_LIMIT),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(invalid("poll_interval_secs", "must be greater than zero"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", "must be greater than zero"));
        }
        for (field, value) in [
            ("poll_interval_secs", self.poll_interval_secs),
            ("first_poll_delay_secs", self.first_poll_delay_secs),
            ("min_message_interval_secs", self.min_message_interval_secs),
            ("request_timeout_secs", self.request_timeout_secs),
        ] {
            if value > MAX_PERIOD_SECS {
                return Err(invalid(
                    field,
                    format!("must be at most {} seconds", MAX_PERIOD_SECS),
                ));
            }
        }
        self.similarity.validate()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn first_poll_delay(&self) -> Duration {
        Duration::from_secs(self.first_poll_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            timeframe: self.timeframe,
            limit: self.candle_limit,
            timeout: self.request_timeout(),
        }
    }

    pub fn significance_config(&self) -> SignificanceConfig {
        SignificanceConfig {
            min_percent_change: self.min_percent_change,
        }
    }

    pub fn dedup_config(&self) -> DedupConfig {
        let secs = self.min_message_interval_secs.min(MAX_PERIOD_SECS);
        let min_message_interval = i64::try_from(secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or_else(chrono::Duration::zero);
        DedupConfig {
            min_message_interval,
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

/// Similarity thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilaritySettings {
    /// Relative change difference below which two candles are similar.
    pub change_diff_ratio: f64,
    /// Relative volume difference below which two candles are similar.
    pub volume_diff_ratio: f64,
}

impl Default for SimilaritySettings {
    fn default() -> Self {
        Self {
            change_diff_ratio: 0.2,
            volume_diff_ratio: 0.3,
        }
    }
}

impl SimilaritySettings {
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("similarity.change_diff_ratio", self.change_diff_ratio),
            ("similarity.volume_diff_ratio", self.volume_diff_ratio),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(field, "must be a non-negative number"));
            }
        }
        Ok(())
    }
}

impl From<&SimilaritySettings> for SimilarityConfig {
    fn from(settings: &SimilaritySettings) -> Self {
        SimilarityConfig {
            max_change_diff: settings.change_diff_ratio,
            max_volume_diff: settings.volume_diff_ratio,
        }
    }
}

/// Telegram credentials, read from the environment.
#[derive(Clone)]
pub struct Credentials {
    pub bot_token: String,
    pub chat_id: i64,
}

impl Credentials {
    /// Uses TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(
            std::env::var("TELEGRAM_BOT_TOKEN").ok(),
            std::env::var("TELEGRAM_CHAT_ID").ok(),
        )
    }

    fn from_vars(token: Option<String>, chat_id: Option<String>) -> Result<Self, ConfigError> {
        let bot_token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingEnv("TELEGRAM_BOT_TOKEN"))?;
        let raw_chat = chat_id
            .filter(|c| !c.trim().is_empty())
            .ok_or(ConfigError::MissingEnv("TELEGRAM_CHAT_ID"))?;
        let chat_id = raw_chat
            .trim()
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidChatId(raw_chat.clone()))?;

        Ok(Self { bot_token, chat_id })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("bot_token", &"***")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.symbols.len(), 4);
        assert_eq!(config.timeframe, Timeframe::M15);
        assert_eq!(config.min_percent_change, 1.67);
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.first_poll_delay(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = AppConfig::from_json(r#"{"min_percent_change": 2.5, "timeframe": "1h"}"#)
            .unwrap();
        assert_eq!(config.min_percent_change, 2.5);
        assert_eq!(config.timeframe, Timeframe::H1);
        assert_eq!(config.candle_limit, 200);
        assert_eq!(config.similarity.volume_diff_ratio, 0.3);
    }

    #[test]
    fn test_symbols_from_json() {
        let config = AppConfig::from_json(
            r#"{"symbols": [{"name": "BTC", "instrument": "BTC/USDT:USDT"}]}"#,
        )
        .unwrap();
        assert_eq!(config.symbols.len(), 1);
        assert!(config.symbols.by_name("btc").is_some());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            AppConfig::from_json(r#"{"min_percent_change": 0}"#),
            Err(ConfigError::InvalidValue { field: "min_percent_change", .. })
        ));
        assert!(matches!(
            AppConfig::from_json(r#"{"candle_limit": 5000}"#),
            Err(ConfigError::InvalidValue { field: "candle_limit", .. })
        ));
        assert!(matches!(
            AppConfig::from_json(r#"{"symbols": []}"#),
            Err(ConfigError::InvalidValue { field: "symbols", .. })
        ));
        assert!(matches!(
            AppConfig::from_json(r#"{"timeframe": "7m"}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_oversized_periods_rejected() {
        assert!(matches!(
            AppConfig::from_json(r#"{"min_message_interval_secs": 100000000000000000}"#),
            Err(ConfigError::InvalidValue { field: "min_message_interval_secs", .. })
        ));
        assert!(matches!(
            AppConfig::from_json(r#"{"first_poll_delay_secs": 18446744073709551615}"#),
            Err(ConfigError::InvalidValue { field: "first_poll_delay_secs", .. })
        ));
        assert!(matches!(
            AppConfig::from_json(r#"{"poll_interval_secs": 31536001}"#),
            Err(ConfigError::InvalidValue { field: "poll_interval_secs", .. })
        ));

        let config = AppConfig::from_json(r#"{"min_message_interval_secs": 31536000}"#).unwrap();
        assert_eq!(
            config.dedup_config().min_message_interval.num_seconds(),
            MAX_PERIOD_SECS as i64
        );
    }

    #[test]
    fn test_dedup_config_clamps_unvalidated_interval() {
        let config = AppConfig {
            min_message_interval_secs: u64::MAX,
            ..AppConfig::default()
        };
        assert_eq!(
            config.dedup_config().min_message_interval.num_seconds(),
            MAX_PERIOD_SECS as i64
        );
    }

    #[test]
    fn test_duplicate_symbols_rejected() {
        let result = AppConfig::from_json(
            r#"{"symbols": [
                {"name": "ADA", "instrument": "ADA/USDT:USDT"},
                {"name": "ada", "instrument": "ADA/USDC:USDC"}
            ]}"#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { field: "symbols", .. })
        ));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load("/nonexistent/movewatch.json").unwrap();
        assert_eq!(config.poll_interval_secs, 30);
    }

    #[test]
    fn test_engine_configs() {
        let config = AppConfig::default();
        assert_eq!(config.dedup_config().min_message_interval.num_seconds(), 300);
        assert_eq!(config.significance_config().min_percent_change, 1.67);

        let similarity: SimilarityConfig = (&config.similarity).into();
        assert_eq!(similarity.max_change_diff, 0.2);

        let fetcher = config.fetcher_config();
        assert_eq!(fetcher.limit, 200);
        assert_eq!(fetcher.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_credentials() {
        let creds =
            Credentials::from_vars(Some("123:abc".into()), Some("-100200".into())).unwrap();
        assert_eq!(creds.chat_id, -100200);
        assert!(!format!("{:?}", creds).contains("123:abc"));

        assert!(matches!(
            Credentials::from_vars(None, Some("1".into())),
            Err(ConfigError::MissingEnv("TELEGRAM_BOT_TOKEN"))
        ));
        assert!(matches!(
            Credentials::from_vars(Some("t".into()), Some("  ".into())),
            Err(ConfigError::MissingEnv("TELEGRAM_CHAT_ID"))
        ));
        assert!(matches!(
            Credentials::from_vars(Some("t".into()), Some("chat".into())),
            Err(ConfigError::InvalidChatId(_))
        ));
    }
}
