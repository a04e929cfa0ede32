// Trading strategy module
pub mod host;
pub mod klinger_leveraged;
pub mod signals;
pub mod sma_crossover;
pub mod sma_regime;
pub mod vix_regime;
pub mod volume_macd;

use crate::models::{Candle, DataFeed, Interval, MarketData, Signal, TargetAllocation};
use crate::Result;

pub use host::{evaluate, evaluate_all};
pub use klinger_leveraged::{KlingerLeveragedStrategy, LeveragedEtf, Underlying};
pub use signals::{KlingerSignalConfig, KlingerSignalGenerator};
pub use sma_crossover::SmaCrossoverStrategy;
pub use sma_regime::SmaRegimeStrategy;
pub use vix_regime::VixRegimeStrategy;
pub use volume_macd::VolumeMacdStrategy;

/// Base trait for signal-emitting strategies
pub trait Strategy: Send + Sync {
    /// Generate a trading signal based on market data
    fn generate_signal(&self, candles: &[Candle]) -> Result<Signal>;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum candles required for this strategy
    fn min_candles_required(&self) -> usize;
}

/// Strategy driven by a host that supplies per-interval market data and
/// rebalances to the returned target allocation
pub trait AllocationStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Tickers the host must supply candles for
    fn assets(&self) -> &[String];

    /// Rebalance frequency
    fn interval(&self) -> Interval;

    /// Auxiliary feeds the host must supply
    fn feeds(&self) -> &[DataFeed] {
        &[]
    }

    /// Compute the target allocation for the current interval
    fn run(&self, data: &MarketData) -> Result<TargetAllocation>;

    /// Allocation substituted when `run` fails
    fn fallback_allocation(&self) -> TargetAllocation {
        TargetAllocation::empty()
    }
}

/// Owned ticker list from static symbols
pub(crate) fn tickers(symbols: &[&str]) -> Vec<String> {
    symbols.iter().map(|s| s.to_string()).collect()
}
