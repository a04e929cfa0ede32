use serde::{Deserialize, Serialize};

use super::Strategy;
use crate::indicators::divergence::DEFAULT_DIVERGENCE_WINDOW;
use crate::indicators::{
    calculate_atr, detect_divergences, DivergenceSeries, KlingerConfig, KlingerOscillator,
    KlingerSeries,
};
use crate::models::{Candle, Signal};
use crate::Result;

/// Configuration for the bot's Klinger signal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KlingerSignalConfig {
    pub klinger: KlingerConfig,
    pub divergence_window: usize,
    /// Candles scanned for support / resistance
    pub level_lookback: usize,
    pub atr_period: usize,
    /// ATR multiples placed beyond support / resistance
    pub atr_multiplier: f64,
}

impl Default for KlingerSignalConfig {
    fn default() -> Self {
        Self {
            // Crypto trades around the clock, raw volume is used
            klinger: KlingerConfig {
                normalize_by_hour: false,
                ..KlingerConfig::default()
            },
            divergence_window: DEFAULT_DIVERGENCE_WINDOW,
            level_lookback: 20,
            atr_period: 14,
            atr_multiplier: 1.0,
        }
    }
}

impl KlingerSignalConfig {
    /// Candles to load before the first signal
    pub fn min_data_points(&self) -> usize {
        (self.klinger.long_period + self.klinger.signal_period).max(100)
    }
}

/// Support (lowest low) and resistance (highest high) over a lookback
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CriticalLevels {
    pub support: f64,
    pub resistance: f64,
}

impl CriticalLevels {
    pub fn from_candles(candles: &[Candle], lookback: usize) -> Option<Self> {
        let start = candles.len().saturating_sub(lookback);
        let recent = &candles[start..];
        if recent.is_empty() {
            return None;
        }

        let support = recent.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
        let resistance = recent
            .iter()
            .map(|c| c.high)
            .fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            support,
            resistance,
        })
    }
}

/// ATR-adjusted exit levels for open positions
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DynamicLevels {
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Push the critical levels out by `multiplier` ATRs
///
/// Without enough history for ATR the critical levels are used unchanged.
pub fn calculate_dynamic_levels(
    candles: &[Candle],
    levels: &CriticalLevels,
    atr_period: usize,
    multiplier: f64,
) -> DynamicLevels {
    match calculate_atr(candles, atr_period) {
        Some(atr) => DynamicLevels {
            stop_loss: levels.support - atr * multiplier,
            take_profit: levels.resistance + atr * multiplier,
        },
        None => {
            tracing::debug!("Not enough history for ATR, using critical levels");
            DynamicLevels {
                stop_loss: levels.support,
                take_profit: levels.resistance,
            }
        }
    }
}

/// Validate that candles are uniformly spaced in time
///
/// Allows up to 1.5x the expected interval between consecutive candles.
pub fn validate_candle_uniformity(
    candles: &[Candle],
    expected_interval_secs: u64,
) -> anyhow::Result<()> {
    if candles.len() < 2 {
        return Ok(());
    }

    let max_gap_secs = expected_interval_secs + (expected_interval_secs / 2);

    for window in candles.windows(2) {
        let time_diff = (window[1].timestamp - window[0].timestamp).num_seconds();

        if time_diff < 0 {
            anyhow::bail!("Candles are not sorted by timestamp");
        }

        let time_diff = time_diff as u64;
        if time_diff > max_gap_secs {
            anyhow::bail!(
                "Data gap detected: {}s between candles (expected ~{}s, max allowed {}s). Gap from {} to {}",
                time_diff,
                expected_interval_secs,
                max_gap_secs,
                window[0].timestamp.format("%Y-%m-%d %H:%M"),
                window[1].timestamp.format("%Y-%m-%d %H:%M")
            );
        }
    }

    Ok(())
}

/// Signal from the histogram's last two samples and the latest confirmed divergence
///
/// A zero cross takes precedence; otherwise a divergence must agree with the
/// sign of the histogram.
pub fn classify(histogram: &[f64], divergences: &DivergenceSeries) -> Signal {
    let [.., previous, current] = histogram else {
        return Signal::Hold;
    };
    let (previous, current) = (*previous, *current);

    if previous <= 0.0 && current > 0.0 {
        tracing::debug!(previous, current, "Histogram crossed above zero");
        Signal::Buy
    } else if previous >= 0.0 && current < 0.0 {
        tracing::debug!(previous, current, "Histogram crossed below zero");
        Signal::Sell
    } else if current > 0.0 && divergences.latest_confirmed_bullish() {
        tracing::debug!(current, "Bullish divergence confirmed");
        Signal::Buy
    } else if current < 0.0 && divergences.latest_confirmed_bearish() {
        tracing::debug!(current, "Bearish divergence confirmed");
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// Everything one evaluation produces
#[derive(Debug, Clone)]
pub struct KlingerEvaluation {
    pub series: KlingerSeries,
    pub divergences: DivergenceSeries,
    pub signal: Signal,
    pub critical_levels: Option<CriticalLevels>,
}

/// Klinger-driven BUY/SELL/HOLD for the live bot
#[derive(Debug, Clone)]
pub struct KlingerSignalGenerator {
    config: KlingerSignalConfig,
    oscillator: KlingerOscillator,
}

impl KlingerSignalGenerator {
    pub fn new(config: KlingerSignalConfig) -> Result<Self> {
        let oscillator = KlingerOscillator::new(config.klinger.clone())?;
        Ok(Self { config, oscillator })
    }

    pub fn config(&self) -> &KlingerSignalConfig {
        &self.config
    }

    pub fn evaluate(&self, candles: &[Candle]) -> Result<KlingerEvaluation> {
        let series = self.oscillator.calculate(candles)?;
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let divergences = detect_divergences(&closes, &series.kvo, self.config.divergence_window);
        let signal = classify(&series.histogram, &divergences);
        let critical_levels = CriticalLevels::from_candles(candles, self.config.level_lookback);

        Ok(KlingerEvaluation {
            series,
            divergences,
            signal,
            critical_levels,
        })
    }

    pub fn dynamic_levels(&self, candles: &[Candle], levels: &CriticalLevels) -> DynamicLevels {
        calculate_dynamic_levels(
            candles,
            levels,
            self.config.atr_period,
            self.config.atr_multiplier,
        )
    }
}

impl Strategy for KlingerSignalGenerator {
    fn generate_signal(&self, candles: &[Candle]) -> Result<Signal> {
        if candles.len() < self.min_candles_required() {
            return Err(format!(
                "Insufficient data: {} candles, need {}",
                candles.len(),
                self.min_candles_required()
            )
            .into());
        }

        Ok(self.evaluate(candles)?.signal)
    }

    fn name(&self) -> &str {
        "KlingerSignalGenerator"
    }

    fn min_candles_required(&self) -> usize {
        self.config.min_data_points()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::candles_with_volume;
    use chrono::{Duration, Utc};

    fn create_test_candle(minutes_ago: i64) -> Candle {
        Candle {
            symbol: "BTCUSDT".to_string(),
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            open: 100.0,
            high: 100.0,
            low: 100.0,
            close: 100.0,
            volume: 1000.0,
        }
    }

    fn no_divergence(len: usize) -> DivergenceSeries {
        DivergenceSeries {
            window: 5,
            bullish: vec![false; len],
            bearish: vec![false; len],
        }
    }

    fn hourly(closes: &[f64]) -> Vec<Candle> {
        candles_with_volume(
            "BTCUSDT",
            closes,
            &vec![1000.0; closes.len()],
            Duration::hours(1),
        )
    }

    #[test]
    fn test_uniform_candles_pass() {
        let candles = vec![
            create_test_candle(10),
            create_test_candle(5),
            create_test_candle(0),
        ];
        assert!(validate_candle_uniformity(&candles, 300).is_ok());
    }

    #[test]
    fn test_gap_detected() {
        let candles = vec![
            create_test_candle(60),
            create_test_candle(5),
            create_test_candle(0),
        ];
        let result = validate_candle_uniformity(&candles, 300);
        assert!(result.unwrap_err().to_string().contains("gap"));
    }

    #[test]
    fn test_backwards_timestamps_fail() {
        let candles = vec![create_test_candle(0), create_test_candle(5)];
        let result = validate_candle_uniformity(&candles, 300);
        assert!(result.unwrap_err().to_string().contains("not sorted"));
    }

    #[test]
    fn test_zero_cross_up_is_buy() {
        let hist = [-2.0, -1.0, 0.5];
        assert_eq!(classify(&hist, &no_divergence(3)), Signal::Buy);
    }

    #[test]
    fn test_zero_cross_down_is_sell() {
        let hist = [2.0, 1.0, -0.5];
        assert_eq!(classify(&hist, &no_divergence(3)), Signal::Sell);
    }

    #[test]
    fn test_positive_histogram_without_divergence_holds() {
        let hist = [1.0, 2.0, 3.0];
        assert_eq!(classify(&hist, &no_divergence(3)), Signal::Hold);
    }

    #[test]
    fn test_divergence_needs_matching_histogram_sign() {
        // Latest confirmed index for 10 bars and window 5 is 7
        let mut divergences = no_divergence(10);
        divergences.bullish[7] = true;

        let positive = [1.0; 10];
        assert_eq!(classify(&positive, &divergences), Signal::Buy);

        let negative = [-1.0; 10];
        assert_eq!(classify(&negative, &divergences), Signal::Hold);
    }

    #[test]
    fn test_short_histogram_holds() {
        assert_eq!(classify(&[1.0], &no_divergence(1)), Signal::Hold);
    }

    #[test]
    fn test_critical_levels_use_lookback() {
        let mut closes = vec![50.0];
        closes.extend((0..20).map(|i| 100.0 + i as f64));
        let candles = hourly(&closes);

        let levels = CriticalLevels::from_candles(&candles, 20).unwrap();
        // The 50.0 candle falls outside the lookback
        assert!((levels.support - 99.0).abs() < 1e-9);
        assert!((levels.resistance - 119.0 * 1.01).abs() < 1e-9);
        assert!(CriticalLevels::from_candles(&[], 20).is_none());
    }

    #[test]
    fn test_dynamic_levels_widen_by_atr() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i % 3) as f64).collect();
        let candles = hourly(&closes);
        let levels = CriticalLevels::from_candles(&candles, 20).unwrap();

        let dynamic = calculate_dynamic_levels(&candles, &levels, 14, 1.0);
        assert!(dynamic.stop_loss < levels.support);
        assert!(dynamic.take_profit > levels.resistance);
    }

    #[test]
    fn test_dynamic_levels_without_atr_history() {
        let candles = hourly(&[100.0, 101.0, 102.0]);
        let levels = CriticalLevels::from_candles(&candles, 20).unwrap();

        let dynamic = calculate_dynamic_levels(&candles, &levels, 14, 1.0);
        assert_eq!(dynamic.stop_loss, levels.support);
        assert_eq!(dynamic.take_profit, levels.resistance);
    }

    #[test]
    fn test_min_data_points() {
        assert_eq!(KlingerSignalConfig::default().min_data_points(), 100);

        let mut config = KlingerSignalConfig::default();
        config.klinger.long_period = 100;
        config.klinger.signal_period = 20;
        assert_eq!(config.min_data_points(), 120);
    }

    #[test]
    fn test_generator_requires_history() {
        let generator = KlingerSignalGenerator::new(KlingerSignalConfig::default()).unwrap();
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        assert!(generator.generate_signal(&hourly(&closes)).is_err());
    }

    #[test]
    fn test_generator_produces_signal() {
        let generator = KlingerSignalGenerator::new(KlingerSignalConfig::default()).unwrap();
        let closes: Vec<f64> = (0..150)
            .map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0)
            .collect();
        let candles = hourly(&closes);

        let evaluation = generator.evaluate(&candles).unwrap();
        assert_eq!(evaluation.series.len(), 150);
        assert!(evaluation.critical_levels.is_some());
        assert!(generator.generate_signal(&candles).is_ok());
    }
}
