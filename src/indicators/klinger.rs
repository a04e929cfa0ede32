//! Klinger Volume Oscillator (KVO)
//!
//! Volume force = volume x |high - low| x trend x volume_factor, where the
//! trend is +1 on an up-close and -1 otherwise. The oscillator is the
//! difference of a short and a long EMA of volume force; the signal line is
//! an EMA of the oscillator and the histogram is their difference.
//!
//! Volume can be normalized by the average volume of its hour of day first,
//! which removes the intraday U-shape seen on hourly equity data.

use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::moving_average::ema_series;
use super::statistics::rolling_zscore;
use super::IndicatorError;
use crate::models::Candle;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KlingerConfig {
    pub short_period: usize,
    pub long_period: usize,
    pub signal_period: usize,
    /// Scaling applied to volume force
    pub volume_factor: f64,
    /// Trailing window for histogram z-score normalization
    pub zscore_window: usize,
    /// Divide volume by the average volume of the same hour of day
    pub normalize_by_hour: bool,
}

impl Default for KlingerConfig {
    fn default() -> Self {
        Self {
            short_period: 34,
            long_period: 55,
            signal_period: 13,
            volume_factor: 0.7,
            zscore_window: 55,
            normalize_by_hour: true,
        }
    }
}

impl KlingerConfig {
    pub fn validate(&self) -> Result<(), IndicatorError> {
        if self.short_period == 0 || self.long_period == 0 || self.signal_period == 0 {
            return Err(IndicatorError::InvalidPeriod(
                "Klinger periods must be positive".to_string(),
            ));
        }
        if self.short_period >= self.long_period {
            return Err(IndicatorError::InvalidPeriod(format!(
                "short period {} must be below long period {}",
                self.short_period, self.long_period
            )));
        }
        if self.zscore_window < 2 {
            return Err(IndicatorError::InvalidPeriod(
                "z-score window needs at least 2 samples".to_string(),
            ));
        }
        Ok(())
    }
}

/// All intermediate and output series, aligned with the input candles
#[derive(Debug, Clone, PartialEq)]
pub struct KlingerSeries {
    pub normalized_volume: Vec<f64>,
    /// +1 up-close, -1 otherwise, 0 for the first candle
    pub trend: Vec<i8>,
    pub volume_force: Vec<f64>,
    pub kvo: Vec<f64>,
    pub signal_line: Vec<f64>,
    pub histogram: Vec<f64>,
    pub normalized_histogram: Vec<Option<f64>>,
}

impl KlingerSeries {
    pub fn len(&self) -> usize {
        self.kvo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kvo.is_empty()
    }

    pub fn latest_kvo(&self) -> Option<f64> {
        self.kvo.last().copied()
    }

    pub fn latest_signal_line(&self) -> Option<f64> {
        self.signal_line.last().copied()
    }

    pub fn latest_histogram(&self) -> Option<f64> {
        self.histogram.last().copied()
    }

    pub fn latest_normalized_histogram(&self) -> Option<f64> {
        self.normalized_histogram.last().copied().flatten()
    }
}

/// Volume divided by the mean volume of candles sharing its hour of day
///
/// An hour whose mean volume is zero normalizes to zero.
pub fn time_normalized_volume(candles: &[Candle]) -> Vec<f64> {
    let mut by_hour: HashMap<u32, (f64, usize)> = HashMap::new();
    for candle in candles {
        let entry = by_hour.entry(candle.timestamp.hour()).or_insert((0.0, 0));
        entry.0 += candle.volume;
        entry.1 += 1;
    }

    candles
        .iter()
        .map(|candle| {
            let (sum, count) = by_hour[&candle.timestamp.hour()];
            let avg = sum / count as f64;
            if avg > 0.0 {
                candle.volume / avg
            } else {
                0.0
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct KlingerOscillator {
    config: KlingerConfig,
}

impl KlingerOscillator {
    pub fn new(config: KlingerConfig) -> Result<Self, IndicatorError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &KlingerConfig {
        &self.config
    }

    /// Candles needed before the signal line has seen a full long-EMA warmup
    pub fn warmup_candles(&self) -> usize {
        self.config.long_period + self.config.signal_period
    }

    pub fn calculate(&self, candles: &[Candle]) -> Result<KlingerSeries, IndicatorError> {
        if candles.len() < 2 {
            return Err(IndicatorError::InsufficientData {
                required: 2,
                available: candles.len(),
            });
        }

        let normalized_volume = if self.config.normalize_by_hour {
            time_normalized_volume(candles)
        } else {
            candles.iter().map(|c| c.volume).collect()
        };

        let trend: Vec<i8> = std::iter::once(0)
            .chain(candles.windows(2).map(|w| {
                if w[1].close > w[0].close {
                    1
                } else {
                    -1
                }
            }))
            .collect();

        let volume_force: Vec<f64> = candles
            .iter()
            .zip(normalized_volume.iter())
            .zip(trend.iter())
            .map(|((candle, volume), &trend)| {
                volume * (candle.high - candle.low).abs() * f64::from(trend)
                    * self.config.volume_factor
            })
            .collect();

        let short_ema = ema_series(&volume_force, self.config.short_period);
        let long_ema = ema_series(&volume_force, self.config.long_period);
        let kvo: Vec<f64> = short_ema
            .iter()
            .zip(long_ema.iter())
            .map(|(s, l)| s - l)
            .collect();

        let signal_line = ema_series(&kvo, self.config.signal_period);
        let histogram: Vec<f64> = kvo
            .iter()
            .zip(signal_line.iter())
            .map(|(k, s)| k - s)
            .collect();
        let normalized_histogram = rolling_zscore(&histogram, self.config.zscore_window);

        Ok(KlingerSeries {
            normalized_volume,
            trend,
            volume_force,
            kvo,
            signal_line,
            histogram,
            normalized_histogram,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn hourly_candles(closes: &[f64], volumes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        closes
            .iter()
            .zip(volumes.iter())
            .enumerate()
            .map(|(i, (&close, &volume))| Candle {
                symbol: "SPY".to_string(),
                timestamp: start + Duration::hours(i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume,
            })
            .collect()
    }

    #[test]
    fn test_rejects_invalid_periods() {
        let config = KlingerConfig {
            short_period: 55,
            long_period: 34,
            ..Default::default()
        };
        assert!(matches!(
            KlingerOscillator::new(config),
            Err(IndicatorError::InvalidPeriod(_))
        ));
    }

    #[test]
    fn test_requires_two_candles() {
        let kvo = KlingerOscillator::new(KlingerConfig::default()).unwrap();
        let candles = hourly_candles(&[100.0], &[1000.0]);
        assert_eq!(
            kvo.calculate(&candles),
            Err(IndicatorError::InsufficientData {
                required: 2,
                available: 1
            })
        );
    }

    #[test]
    fn test_time_normalized_volume_by_hour() {
        // 48 hourly candles: hour 0 always trades 2x the volume of other hours
        let volumes: Vec<f64> = (0..48)
            .map(|i| if i % 24 == 0 { 2000.0 } else { 1000.0 })
            .collect();
        let candles = hourly_candles(&vec![100.0; 48], &volumes);

        let normalized = time_normalized_volume(&candles);
        assert!(normalized.iter().all(|&v| (v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_histogram_is_kvo_minus_signal() {
        let closes: Vec<f64> = (0..120).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let volumes: Vec<f64> = (0..120).map(|i| 1000.0 + (i % 7) as f64 * 150.0).collect();
        let candles = hourly_candles(&closes, &volumes);

        let series = KlingerOscillator::new(KlingerConfig::default())
            .unwrap()
            .calculate(&candles)
            .unwrap();

        assert_eq!(series.len(), candles.len());
        for i in 0..series.len() {
            assert_eq!(series.histogram[i], series.kvo[i] - series.signal_line[i]);
        }
    }

    #[test]
    fn test_trend_non_negative_for_rising_closes() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + i as f64).collect();
        let candles = hourly_candles(&closes, &vec![1000.0; 80]);

        let series = KlingerOscillator::new(KlingerConfig::default())
            .unwrap()
            .calculate(&candles)
            .unwrap();

        assert_eq!(series.trend[0], 0);
        assert!(series.trend.iter().all(|&t| t >= 0));
        assert!(series.volume_force.iter().all(|&vf| vf >= 0.0));
    }

    #[test]
    fn test_normalized_histogram_undefined_before_window() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64).sin()).collect();
        let candles = hourly_candles(&closes, &vec![1000.0; 60]);

        let series = KlingerOscillator::new(KlingerConfig::default())
            .unwrap()
            .calculate(&candles)
            .unwrap();

        assert!(series.normalized_histogram[..54].iter().all(Option::is_none));
        assert!(series.latest_normalized_histogram().is_some());
    }

    #[test]
    fn test_raw_volume_mode() {
        let config = KlingerConfig {
            normalize_by_hour: false,
            ..Default::default()
        };
        let candles = hourly_candles(&[100.0, 101.0, 102.0], &[500.0, 600.0, 700.0]);
        let series = KlingerOscillator::new(config)
            .unwrap()
            .calculate(&candles)
            .unwrap();

        assert_eq!(series.normalized_volume, vec![500.0, 600.0, 700.0]);
        // 600 x range 2 x trend 1 x 0.7
        assert!((series.volume_force[1] - 840.0).abs() < 1e-9);
    }
}
