use std::sync::{Arc, Mutex};

use crate::execution::PositionManager;
use crate::models::Signal;

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionAction {
    Buy { quantity: f64 },
    /// Close every open position on the symbol
    CloseAll { quantity: f64 },
    Skip,
}

#[derive(Debug, Clone)]
pub struct ExecutionDecision {
    pub action: ExecutionAction,
    pub reason: String,
}

impl ExecutionDecision {
    fn skip(reason: impl Into<String>) -> Self {
        Self {
            action: ExecutionAction::Skip,
            reason: reason.into(),
        }
    }
}

/// Round a quantity down to the lot precision of its symbol
///
/// Symbols mentioning BTC anywhere (`ETHBTC`, `WBTCUSDT`) trade in 5
/// decimals, then ETH in 4, everything else in 2.
pub fn round_quantity(symbol: &str, quantity: f64) -> f64 {
    let decimals = if symbol.contains("BTC") {
        5
    } else if symbol.contains("ETH") {
        4
    } else {
        2
    };
    let factor = 10f64.powi(decimals);
    (quantity * factor).floor() / factor
}

/// Turns signals into order decisions
pub struct Executor {
    position_manager: Arc<Mutex<PositionManager>>,
    /// Fraction of available balance committed per BUY
    max_position_size: f64,
}

impl Executor {
    pub fn new(position_manager: Arc<Mutex<PositionManager>>, max_position_size: f64) -> Self {
        Self {
            position_manager,
            max_position_size,
        }
    }

    pub fn process_signal(
        &self,
        signal: Signal,
        symbol: &str,
        current_price: f64,
        available_balance: f64,
    ) -> anyhow::Result<ExecutionDecision> {
        match signal {
            Signal::Buy => {
                if current_price <= 0.0 {
                    return Ok(ExecutionDecision::skip(format!(
                        "Invalid price {}",
                        current_price
                    )));
                }

                let quantity = self.calculate_position_size(symbol, current_price, available_balance);
                if quantity <= 0.0 {
                    return Ok(ExecutionDecision::skip(format!(
                        "Position size rounds to zero (balance {:.2})",
                        available_balance
                    )));
                }

                Ok(ExecutionDecision {
                    action: ExecutionAction::Buy { quantity },
                    reason: format!(
                        "Buy signal: {:.1}% of {:.2} balance",
                        self.max_position_size * 100.0,
                        available_balance
                    ),
                })
            }

            Signal::Sell => {
                let pm = self
                    .position_manager
                    .lock()
                    .map_err(|e| anyhow::anyhow!("Position manager lock poisoned: {}", e))?;

                let (count, quantity) = pm
                    .open_positions()
                    .filter(|p| p.symbol == symbol)
                    .fold((0usize, 0.0), |(n, q), p| (n + 1, q + p.quantity));

                if count == 0 {
                    return Ok(ExecutionDecision::skip("No position to sell"));
                }

                Ok(ExecutionDecision {
                    action: ExecutionAction::CloseAll { quantity },
                    reason: format!("Sell signal closes {} position(s)", count),
                })
            }

            Signal::Hold => Ok(ExecutionDecision::skip("Hold signal")),
        }
    }

    fn calculate_position_size(&self, symbol: &str, price: f64, balance: f64) -> f64 {
        round_quantity(symbol, balance * self.max_position_size / price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> (Executor, Arc<Mutex<PositionManager>>) {
        let pm = Arc::new(Mutex::new(PositionManager::new(0.03, 0.06)));
        (Executor::new(pm.clone(), 0.1), pm)
    }

    #[test]
    fn test_round_quantity_by_symbol() {
        assert_eq!(round_quantity("BTCUSDT", 0.0023819), 0.00238);
        assert_eq!(round_quantity("ETHUSDT", 0.0456789), 0.0456);
        assert_eq!(round_quantity("SOLUSDT", 1.239), 1.23);
        assert_eq!(round_quantity("WBTCUSDT", 0.0456789), 0.04567);
        assert_eq!(round_quantity("ETHBTC", 0.0456789), 0.04567);
        assert_eq!(round_quantity("STETHUSDT", 0.0456789), 0.0456);
    }

    #[test]
    fn test_buy_sizes_from_balance() {
        let (executor, _) = executor();
        let decision = executor
            .process_signal(Signal::Buy, "BTCUSDT", 42000.0, 1000.0)
            .unwrap();

        // 1000 * 0.1 / 42000 = 0.00238095...
        assert_eq!(decision.action, ExecutionAction::Buy { quantity: 0.00238 });
    }

    #[test]
    fn test_buy_skips_when_size_rounds_to_zero() {
        let (executor, _) = executor();
        let decision = executor
            .process_signal(Signal::Buy, "SOLUSDT", 100.0, 0.01)
            .unwrap();

        assert_eq!(decision.action, ExecutionAction::Skip);
        assert!(decision.reason.contains("rounds to zero"));
    }

    #[test]
    fn test_sell_without_position_skips() {
        let (executor, _) = executor();
        let decision = executor
            .process_signal(Signal::Sell, "BTCUSDT", 42000.0, 1000.0)
            .unwrap();

        assert_eq!(decision.action, ExecutionAction::Skip);
        assert!(decision.reason.contains("No position"));
    }

    #[test]
    fn test_sell_closes_all_positions() {
        let (executor, pm) = executor();
        {
            let mut pm = pm.lock().unwrap();
            pm.open_position("BTCUSDT".to_string(), 40000.0, 0.001).unwrap();
            pm.open_position("BTCUSDT".to_string(), 41000.0, 0.002).unwrap();
        }

        let decision = executor
            .process_signal(Signal::Sell, "BTCUSDT", 42000.0, 1000.0)
            .unwrap();

        match decision.action {
            ExecutionAction::CloseAll { quantity } => assert!((quantity - 0.003).abs() < 1e-12),
            other => panic!("expected CloseAll, got {:?}", other),
        }
    }

    #[test]
    fn test_hold_signal_skips() {
        let (executor, _) = executor();
        let decision = executor
            .process_signal(Signal::Hold, "BTCUSDT", 42000.0, 1000.0)
            .unwrap();
        assert_eq!(decision.action, ExecutionAction::Skip);
    }
}
