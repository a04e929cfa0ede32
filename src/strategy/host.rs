use super::AllocationStrategy;
use crate::models::{MarketData, TargetAllocation};

/// Run one allocation strategy for the current interval
///
/// Failures are logged and replaced by the strategy's fallback allocation,
/// so the host always receives a valid allocation.
pub fn evaluate(strategy: &dyn AllocationStrategy, data: &MarketData) -> TargetAllocation {
    for asset in strategy.assets() {
        if data.candles(asset).is_none() {
            tracing::debug!(
                strategy = strategy.name(),
                asset = %asset,
                "No candles supplied for asset"
            );
        }
    }

    match strategy.run(data) {
        Ok(allocation) => {
            tracing::info!(
                strategy = strategy.name(),
                interval = %strategy.interval(),
                allocation = %allocation,
                "Computed target allocation"
            );
            allocation
        }
        Err(e) => {
            let fallback = strategy.fallback_allocation();
            tracing::warn!(
                strategy = strategy.name(),
                error = %e,
                fallback = %fallback,
                "Strategy run failed, using fallback allocation"
            );
            fallback
        }
    }
}

/// Evaluate several strategies against the same market data
pub fn evaluate_all(
    strategies: &[Box<dyn AllocationStrategy>],
    data: &MarketData,
) -> Vec<(String, TargetAllocation)> {
    strategies
        .iter()
        .map(|s| (s.name().to_string(), evaluate(s.as_ref(), data)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Interval;
    use crate::Result;

    struct FailingStrategy {
        assets: Vec<String>,
    }

    impl AllocationStrategy for FailingStrategy {
        fn name(&self) -> &str {
            "FailingStrategy"
        }

        fn assets(&self) -> &[String] {
            &self.assets
        }

        fn interval(&self) -> Interval {
            Interval::OneDay
        }

        fn run(&self, _data: &MarketData) -> Result<TargetAllocation> {
            Err("upstream data missing".into())
        }

        fn fallback_allocation(&self) -> TargetAllocation {
            TargetAllocation::from_pairs([("SPY", 0.1)])
        }
    }

    #[test]
    fn test_failure_substitutes_fallback() {
        let strategy = FailingStrategy {
            assets: vec!["SPY".to_string()],
        };
        let allocation = evaluate(&strategy, &MarketData::new());
        assert_eq!(allocation.get("SPY"), Some(0.1));
    }

    #[test]
    fn test_evaluate_all_names_results() {
        let strategies: Vec<Box<dyn AllocationStrategy>> = vec![Box::new(FailingStrategy {
            assets: vec!["SPY".to_string()],
        })];
        let results = evaluate_all(&strategies, &MarketData::new());

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "FailingStrategy");
    }
}
