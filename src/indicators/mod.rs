// Technical indicators module
// Implements SMA/EMA, RSI, MACD, ATR, rolling statistics and the Klinger oscillator

pub mod atr;
pub mod divergence;
pub mod klinger;
pub mod macd;
pub mod moving_average;
pub mod rsi;
pub mod statistics;

pub use atr::calculate_atr;
pub use divergence::{detect_divergences, DivergenceSeries};
pub use klinger::{KlingerConfig, KlingerOscillator, KlingerSeries};
pub use macd::{calculate_macd, MacdSeries};
pub use moving_average::{calculate_sma, ema_series, sma_series};
pub use rsi::calculate_rsi;
pub use statistics::{annualized_volatility, rolling_zscore};

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IndicatorError {
    #[error("Insufficient data: {available} candles, need {required}")]
    InsufficientData { required: usize, available: usize },

    #[error("Invalid period: {0}")]
    InvalidPeriod(String),
}
