use super::{tickers, AllocationStrategy};
use crate::models::{DataFeed, Interval, MarketData, TargetAllocation};
use crate::Result;

/// Long/short leveraged Nasdaq split by VIX level
#[derive(Debug, Clone)]
pub struct VixRegimeStrategy {
    assets: Vec<String>,
    low_threshold: f64,
    high_threshold: f64,
}

impl VixRegimeStrategy {
    pub fn new(low_threshold: f64, high_threshold: f64) -> Self {
        Self {
            assets: tickers(&["TQQQ", "SQQQ"]),
            low_threshold,
            high_threshold,
        }
    }

    /// (long weight, short weight) for a VIX level
    fn split(&self, vix: f64) -> (f64, f64) {
        if vix < self.low_threshold {
            (0.5, 0.0)
        } else if vix > self.high_threshold {
            (0.0, 0.5)
        } else {
            (0.25, 0.25)
        }
    }
}

impl Default for VixRegimeStrategy {
    fn default() -> Self {
        Self::new(12.0, 20.0)
    }
}

impl AllocationStrategy for VixRegimeStrategy {
    fn name(&self) -> &str {
        "VixRegimeStrategy"
    }

    fn assets(&self) -> &[String] {
        &self.assets
    }

    fn interval(&self) -> Interval {
        Interval::OneHour
    }

    fn feeds(&self) -> &[DataFeed] {
        &[DataFeed::Vix]
    }

    fn run(&self, data: &MarketData) -> Result<TargetAllocation> {
        let vix = data
            .latest_feed_value(DataFeed::Vix)
            .ok_or("No VIX data available")?;
        tracing::info!(vix, "Current VIX: {}", vix);

        let (long, short) = self.split(vix);
        Ok(TargetAllocation::from_pairs([
            ("TQQQ", long),
            ("SQQQ", short),
        ]))
    }
}
