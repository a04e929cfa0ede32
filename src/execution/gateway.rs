use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::TradeSide;

#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: f64,
    /// Reference price for simulated fills
    pub price: f64,
}

#[derive(Debug, Clone)]
pub struct OrderFill {
    pub order_id: Uuid,
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: f64,
    pub price: f64,
    pub filled_at: DateTime<Utc>,
}

/// Where orders are sent
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn place_order(&self, order: OrderRequest) -> anyhow::Result<OrderFill>;

    /// Quote balance available for new positions
    async fn available_balance(&self) -> anyhow::Result<f64>;
}

/// Fills every order immediately at its reference price
///
/// The reported balance is fixed; fills are recorded for inspection.
pub struct SimulatedGateway {
    balance: f64,
    fills: Mutex<Vec<OrderFill>>,
}

impl SimulatedGateway {
    pub fn new(balance: f64) -> Self {
        Self {
            balance,
            fills: Mutex::new(Vec::new()),
        }
    }

    pub fn fills(&self) -> Vec<OrderFill> {
        self.fills
            .lock()
            .map(|fills| fills.clone())
            .unwrap_or_default()
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(1000.0)
    }
}

#[async_trait]
impl OrderGateway for SimulatedGateway {
    async fn place_order(&self, order: OrderRequest) -> anyhow::Result<OrderFill> {
        if order.quantity <= 0.0 {
            anyhow::bail!("Order quantity must be positive, got {}", order.quantity);
        }

        let fill = OrderFill {
            order_id: Uuid::new_v4(),
            symbol: order.symbol,
            side: order.side,
            quantity: order.quantity,
            price: order.price,
            filled_at: Utc::now(),
        };

        tracing::info!(
            order_id = %fill.order_id,
            symbol = %fill.symbol,
            side = ?fill.side,
            quantity = fill.quantity,
            price = fill.price,
            "Simulated order filled"
        );

        self.fills
            .lock()
            .map_err(|e| anyhow::anyhow!("Fill log lock poisoned: {}", e))?
            .push(fill.clone());
        Ok(fill)
    }

    async fn available_balance(&self) -> anyhow::Result<f64> {
        Ok(self.balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(quantity: f64) -> OrderRequest {
        OrderRequest {
            symbol: "BTCUSDT".to_string(),
            side: TradeSide::Buy,
            quantity,
            price: 42000.0,
        }
    }

    #[tokio::test]
    async fn test_fills_immediately() {
        let gateway = SimulatedGateway::default();
        let fill = gateway.place_order(order(0.001)).await.unwrap();

        assert_eq!(fill.quantity, 0.001);
        assert_eq!(fill.price, 42000.0);
        assert_eq!(gateway.fills().len(), 1);
    }

    #[tokio::test]
    async fn test_unique_order_ids() {
        let gateway = SimulatedGateway::default();
        let a = gateway.place_order(order(1.0)).await.unwrap();
        let b = gateway.place_order(order(1.0)).await.unwrap();
        assert_ne!(a.order_id, b.order_id);
    }

    #[tokio::test]
    async fn test_rejects_empty_order() {
        let gateway = SimulatedGateway::default();
        assert!(gateway.place_order(order(0.0)).await.is_err());
    }

    #[tokio::test]
    async fn test_fixed_balance() {
        assert_eq!(SimulatedGateway::default().available_balance().await.unwrap(), 1000.0);
        assert_eq!(SimulatedGateway::new(50.0).available_balance().await.unwrap(), 50.0);
    }
}
