use std::collections::BTreeMap;

use super::{tickers, AllocationStrategy};
use crate::indicators::{calculate_macd, sma_series};
use crate::models::{Interval, MarketData, TargetAllocation};
use crate::Result;

/// Volume trend + MACD confirmation
///
/// Per ticker:
/// - Rising volume (short volume SMA above long) and MACD above its signal: full weight
/// - Falling volume or MACD below its signal: no position
/// - Otherwise, or with too little history: minimal weight
#[derive(Debug, Clone)]
pub struct VolumeMacdConfig {
    pub short_volume_period: usize,
    pub long_volume_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub full_weight: f64,
    pub minimal_weight: f64,
}

impl Default for VolumeMacdConfig {
    fn default() -> Self {
        Self {
            short_volume_period: 10,
            long_volume_period: 30,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            full_weight: 0.5,
            minimal_weight: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VolumeMacdStrategy {
    config: VolumeMacdConfig,
    assets: Vec<String>,
}

impl VolumeMacdStrategy {
    pub fn new(assets: Vec<String>, config: VolumeMacdConfig) -> Self {
        Self { config, assets }
    }

    fn weight_for(&self, data: &MarketData, ticker: &str) -> f64 {
        let (Some(volumes), Some(closes)) = (data.volumes(ticker), data.closes(ticker)) else {
            return self.config.minimal_weight;
        };

        let short_vol = sma_series(&volumes, self.config.short_volume_period);
        let long_vol = sma_series(&volumes, self.config.long_volume_period);
        let macd = calculate_macd(
            &closes,
            self.config.macd_fast,
            self.config.macd_slow,
            self.config.macd_signal,
        );

        let (Some(short_vol), Some(long_vol), Some(macd)) = (short_vol.last(), long_vol.last(), macd)
        else {
            tracing::debug!(ticker, "Not enough history, holding minimal position");
            return self.config.minimal_weight;
        };
        let (Some(macd_line), Some(signal_line)) = (macd.latest_macd(), macd.latest_signal()) else {
            return self.config.minimal_weight;
        };

        let volume_change = short_vol - long_vol;
        if volume_change > 0.0 && macd_line > signal_line {
            self.config.full_weight
        } else if volume_change < 0.0 || macd_line < signal_line {
            0.0
        } else {
            self.config.minimal_weight
        }
    }
}

impl Default for VolumeMacdStrategy {
    fn default() -> Self {
        Self::new(tickers(&["AAPL", "MSFT"]), VolumeMacdConfig::default())
    }
}

impl AllocationStrategy for VolumeMacdStrategy {
    fn name(&self) -> &str {
        "VolumeMacdStrategy"
    }

    fn assets(&self) -> &[String] {
        &self.assets
    }

    fn interval(&self) -> Interval {
        Interval::OneDay
    }

    fn run(&self, data: &MarketData) -> Result<TargetAllocation> {
        let weights: BTreeMap<String, f64> = self
            .assets
            .iter()
            .map(|ticker| (ticker.clone(), self.weight_for(data, ticker)))
            .collect();

        Ok(TargetAllocation::normalized(weights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::candles_with_volume;
    use chrono::Duration;

    fn data_for(ticker: &str, closes: &[f64], volumes: &[f64]) -> MarketData {
        MarketData::new().with_candles(
            ticker,
            candles_with_volume(ticker, closes, volumes, Duration::days(1)),
        )
    }

    fn single(ticker: &str) -> VolumeMacdStrategy {
        VolumeMacdStrategy::new(vec![ticker.to_string()], VolumeMacdConfig::default())
    }

    #[test]
    fn test_insufficient_data_holds_minimal_position() {
        let data = data_for("AAPL", &[100.0; 5], &[1000.0; 5]);
        let allocation = single("AAPL").run(&data).unwrap();
        assert_eq!(allocation.get("AAPL"), Some(0.1));
    }

    #[test]
    fn test_rising_volume_and_momentum_takes_full_weight() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let volumes: Vec<f64> = (0..60).map(|i| 1000.0 + i as f64 * 50.0).collect();
        let data = data_for("AAPL", &closes, &volumes);

        let allocation = single("AAPL").run(&data).unwrap();
        assert_eq!(allocation.get("AAPL"), Some(0.5));
    }

    #[test]
    fn test_falling_volume_exits() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let volumes: Vec<f64> = (0..60).map(|i| 5000.0 - i as f64 * 50.0).collect();
        let data = data_for("AAPL", &closes, &volumes);

        let allocation = single("AAPL").run(&data).unwrap();
        assert_eq!(allocation.get("AAPL"), Some(0.0));
    }

    #[test]
    fn test_two_tickers_never_exceed_full_portfolio() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let volumes: Vec<f64> = (0..60).map(|i| 1000.0 + i as f64 * 50.0).collect();
        let data = data_for("AAPL", &closes, &volumes).with_candles(
            "MSFT",
            candles_with_volume("MSFT", &closes, &volumes, Duration::days(1)),
        );

        let allocation = VolumeMacdStrategy::default().run(&data).unwrap();
        assert!(allocation.total() <= 1.0 + 1e-12);
    }
}
