//! Application configuration
//!
//! Layered from built-in defaults, an optional `strategy.toml`, then
//! `TRADER_*` environment variables (`.env` is loaded first). Nested keys use
//! a double underscore: `TRADER_BACKTEST__Z_THRESHOLD=1.5`.

use crate::algorithms::MeanReversionStrategy;
use crate::backtest::BacktestParams;
use crate::error::{Result, StrategyError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "strategy.toml";

/// Configuration keys and sources
pub mod keys {
    pub const ENV_PREFIX: &str = "TRADER";
    pub const ENV_SEPARATOR: &str = "__";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub coingecko: CoinGeckoConfig,
    pub predictor: PredictorConfig,
    pub market: MarketConfig,
    pub backtest: BacktestParams,
    pub decision: MeanReversionStrategy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoinGeckoConfig {
    /// Override for the API root, e.g. a proxy or mock server
    pub base_url: Option<String>,
    /// Pro API key; switches to the pro endpoint when set
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Prediction service root; no predictions are fetched when unset
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub token: String,
    /// Days of daily history to fetch
    pub days: u32,
    pub history_cache_secs: i64,
    /// Token to use instead when the requested one does not exist
    pub fallback_token: Option<String>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            token: "solana".to_string(),
            days: 90,
            history_cache_secs: 300,
            fallback_token: None,
        }
    }
}

impl AppConfig {
    /// Load `.env`, then `strategy.toml` from the working directory if present
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Defaults, overlaid by the TOML file at `path` (optional, any extension)
    /// and the environment
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(keys::ENV_PREFIX)
                    .prefix_separator("_")
                    .separator(keys::ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?;

        let app: AppConfig = settings.try_deserialize()?;
        app.validate()?;
        debug!("Configuration loaded from {}", path.display());
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        self.backtest.validate()?;
        self.decision.validate()?;
        if self.market.token.trim().is_empty() {
            return Err(StrategyError::invalid("market.token", "must not be empty"));
        }
        if self.market.days == 0 {
            return Err(StrategyError::invalid("market.days", "must be at least 1"));
        }
        if self.market.history_cache_secs < 0 {
            return Err(StrategyError::invalid(
                "market.history_cache_secs",
                "must not be negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::ZScoreWindow;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.market.token, "solana");
        assert_eq!(config.market.days, 90);
        assert_eq!(config.market.history_cache_secs, 300);
        assert_eq!(config.backtest, BacktestParams::default());
        assert_eq!(config.decision.threshold, 1.5);
        assert_eq!(config.decision.ai_override_pct, 0.05);
        assert!(config.predictor.url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.market.token, "solana");
        assert_eq!(config.backtest.initial_balance, 10_000.0);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strategy.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[market]
token = "bitcoin"
days = 30
fallback_token = "avalanche-2"

[predictor]
url = "http://localhost:8000"

[backtest]
z_threshold = 1.25
stop_loss_pct = 0.08

[backtest.window]
mode = "trailing"
size = 30

[decision]
threshold = 2.0
"#
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.market.token, "bitcoin");
        assert_eq!(config.market.days, 30);
        assert_eq!(config.market.fallback_token.as_deref(), Some("avalanche-2"));
        assert_eq!(config.predictor.url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(config.backtest.z_threshold, 1.25);
        assert_eq!(config.backtest.stop_loss_pct, 0.08);
        assert_eq!(config.backtest.take_profit_pct, 0.10);
        assert_eq!(config.backtest.window, ZScoreWindow::Trailing(30));
        assert_eq!(config.decision.threshold, 2.0);
        assert_eq!(config.decision.ai_override_pct, 0.05);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strategy.toml");
        std::fs::write(&path, "[backtest]\nstop_loss_pct = 1.5\n").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(
            err,
            StrategyError::InvalidParameter { name: "stop_loss_pct", .. }
        ));
    }

    #[test]
    fn test_file_without_extension_is_read_as_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("myconf");
        std::fs::write(&path, "[market]\ntoken = \"ethereum\"\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.market.token, "ethereum");
    }
}
