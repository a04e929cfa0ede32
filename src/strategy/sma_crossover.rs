use super::AllocationStrategy;
use crate::indicators::sma_series;
use crate::models::{Interval, MarketData, TargetAllocation};
use crate::Result;

/// Single-asset SMA crossover
///
/// Fully invested while the short SMA is above the long SMA, flat otherwise
/// or while there is not enough history for both averages.
#[derive(Debug, Clone)]
pub struct SmaCrossoverStrategy {
    assets: Vec<String>,
    short_period: usize,
    long_period: usize,
}

impl SmaCrossoverStrategy {
    pub fn new(ticker: &str, short_period: usize, long_period: usize) -> Self {
        Self {
            assets: vec![ticker.to_string()],
            short_period,
            long_period,
        }
    }

    fn ticker(&self) -> &str {
        &self.assets[0]
    }
}

impl Default for SmaCrossoverStrategy {
    fn default() -> Self {
        Self::new("QQQ", 5, 20)
    }
}

impl AllocationStrategy for SmaCrossoverStrategy {
    fn name(&self) -> &str {
        "SmaCrossoverStrategy"
    }

    fn assets(&self) -> &[String] {
        &self.assets
    }

    fn interval(&self) -> Interval {
        Interval::OneHour
    }

    fn run(&self, data: &MarketData) -> Result<TargetAllocation> {
        let ticker = self.ticker();
        let closes = data
            .closes(ticker)
            .ok_or_else(|| format!("No data for {}", ticker))?;

        let short = sma_series(&closes, self.short_period);
        let long = sma_series(&closes, self.long_period);

        let allocation = match (short.last(), long.last()) {
            (Some(short), Some(long)) if short > long => 1.0,
            _ => 0.0,
        };

        tracing::info!(ticker, allocation, "{} allocation: {}", ticker, allocation);

        Ok(TargetAllocation::from_pairs([(ticker, allocation)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::candles_with_volume;
    use chrono::Duration;

    fn hourly(closes: &[f64]) -> MarketData {
        MarketData::new().with_candles(
            "QQQ",
            candles_with_volume("QQQ", closes, &vec![1000.0; closes.len()], Duration::hours(1)),
        )
    }

    #[test]
    fn test_uptrend_fully_invested() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let allocation = SmaCrossoverStrategy::default().run(&hourly(&closes)).unwrap();
        assert_eq!(allocation.get("QQQ"), Some(1.0));
    }

    #[test]
    fn test_downtrend_flat() {
        let closes: Vec<f64> = (0..30).map(|i| 200.0 - i as f64).collect();
        let allocation = SmaCrossoverStrategy::default().run(&hourly(&closes)).unwrap();
        assert_eq!(allocation.get("QQQ"), Some(0.0));
    }

    #[test]
    fn test_insufficient_history_is_flat() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let allocation = SmaCrossoverStrategy::default().run(&hourly(&closes)).unwrap();
        assert_eq!(allocation.get("QQQ"), Some(0.0));
    }
}
