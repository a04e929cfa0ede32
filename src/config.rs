//! Bot configuration
//!
//! Layered lowest to highest: serde defaults, an optional config file, then
//! `STRATEGYBOT_*` environment variables (`STRATEGYBOT_SYMBOL=ETHUSDT`).

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::indicators::KlingerConfig;
use crate::models::parse_interval;
use crate::strategy::signals::KlingerSignalConfig;

const ENV_PREFIX: &str = "STRATEGYBOT";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BotConfig {
    pub exchange: String,
    pub base_url: String,
    pub symbol: String,
    pub interval: String,
    pub short_period: usize,
    pub long_period: usize,
    pub signal_period: usize,
    /// Fraction of available balance per entry
    pub max_position_size: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    /// Balance reported by the simulated gateway
    pub initial_balance: f64,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            exchange: "binance".to_string(),
            base_url: "https://api.binance.com".to_string(),
            symbol: "BTCUSDT".to_string(),
            interval: "1h".to_string(),
            short_period: 34,
            long_period: 55,
            signal_period: 13,
            max_position_size: 0.1,
            stop_loss_pct: 0.03,
            take_profit_pct: 0.06,
            initial_balance: 1000.0,
            api_key: None,
            api_secret: None,
        }
    }
}

impl BotConfig {
    /// Load from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let config: BotConfig = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.exchange != "binance" {
            return Err(config::ConfigError::Message(format!(
                "Unsupported exchange: {}",
                self.exchange
            )));
        }
        if parse_interval(&self.interval).is_none() {
            return Err(config::ConfigError::Message(format!(
                "Invalid interval: {} (expected a positive count followed by m, h or d)",
                self.interval
            )));
        }
        if !(self.max_position_size > 0.0 && self.max_position_size <= 1.0) {
            return Err(config::ConfigError::Message(format!(
                "max_position_size must be in (0, 1], got {}",
                self.max_position_size
            )));
        }
        if self.stop_loss_pct <= 0.0 || self.take_profit_pct <= 0.0 {
            return Err(config::ConfigError::Message(
                "stop_loss_pct and take_profit_pct must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Signal settings derived from the configured periods
    pub fn signal_config(&self) -> KlingerSignalConfig {
        let defaults = KlingerSignalConfig::default();
        KlingerSignalConfig {
            klinger: KlingerConfig {
                short_period: self.short_period,
                long_period: self.long_period,
                signal_period: self.signal_period,
                ..defaults.klinger.clone()
            },
            ..defaults
        }
    }
}
