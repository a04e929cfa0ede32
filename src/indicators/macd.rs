//! MACD (Moving Average Convergence Divergence)
//!
//! MACD line = EMA(fast) - EMA(slow), signal = EMA(signal) of the MACD line,
//! histogram = MACD line - signal.

use super::moving_average::ema_series;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl MacdSeries {
    pub fn latest_macd(&self) -> Option<f64> {
        self.macd.last().copied()
    }

    pub fn latest_signal(&self) -> Option<f64> {
        self.signal.last().copied()
    }
}

/// Calculate MACD over `prices`
///
/// Returns None until at least `slow` prices are available.
pub fn calculate_macd(
    prices: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Option<MacdSeries> {
    if fast == 0 || slow == 0 || signal_period == 0 || prices.len() < slow {
        return None;
    }

    let fast_ema = ema_series(prices, fast);
    let slow_ema = ema_series(prices, slow);

    let macd: Vec<f64> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| f - s)
        .collect();
    let signal = ema_series(&macd, signal_period);
    let histogram = macd.iter().zip(signal.iter()).map(|(m, s)| m - s).collect();

    Some(MacdSeries {
        macd,
        signal,
        histogram,
    })
}
