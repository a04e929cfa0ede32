use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

use crate::strategy::signals::DynamicLevels;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    /// Price fell through the ATR-adjusted support
    SupportBreak,
    /// Closed by a SELL signal
    StrategySell,
    Manual,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "stop loss",
            ExitReason::TakeProfit => "take profit",
            ExitReason::SupportBreak => "support break",
            ExitReason::StrategySell => "sell signal",
            ExitReason::Manual => "manual",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct Position {
    pub id: Uuid,
    pub symbol: String,
    pub entry_price: f64,
    pub quantity: f64,
    pub entry_time: DateTime<Utc>,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub status: PositionStatus,
    pub realized_pnl: Option<f64>,
    pub exit_price: Option<f64>,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_reason: Option<ExitReason>,
}

impl Position {
    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        (current_price - self.entry_price) * self.quantity
    }
}

/// Tracks open and closed positions with fixed-percentage stops
pub struct PositionManager {
    positions: Vec<Position>,
    stop_loss_pct: f64,
    take_profit_pct: f64,
    total_pnl: f64,
}

impl PositionManager {
    pub fn new(stop_loss_pct: f64, take_profit_pct: f64) -> Self {
        Self {
            positions: Vec::new(),
            stop_loss_pct,
            take_profit_pct,
            total_pnl: 0.0,
        }
    }

    pub fn all_positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions
            .iter()
            .filter(|p| p.status == PositionStatus::Open)
    }

    pub fn has_open_position(&self, symbol: &str) -> bool {
        self.open_positions().any(|p| p.symbol == symbol)
    }

    /// Total realized P&L
    pub fn total_pnl(&self) -> f64 {
        self.total_pnl
    }

    pub fn unrealized_pnl(&self, symbol: &str, current_price: f64) -> f64 {
        self.open_positions()
            .filter(|p| p.symbol == symbol)
            .map(|p| p.unrealized_pnl(current_price))
            .sum()
    }

    pub fn open_position(
        &mut self,
        symbol: String,
        entry_price: f64,
        quantity: f64,
    ) -> anyhow::Result<Uuid> {
        self.open_position_at(symbol, entry_price, quantity, Utc::now())
    }

    pub fn open_position_at(
        &mut self,
        symbol: String,
        entry_price: f64,
        quantity: f64,
        entry_time: DateTime<Utc>,
    ) -> anyhow::Result<Uuid> {
        if entry_price <= 0.0 || quantity <= 0.0 {
            anyhow::bail!(
                "Invalid position for {}: price {} quantity {}",
                symbol,
                entry_price,
                quantity
            );
        }

        let id = Uuid::new_v4();
        let stop_loss = entry_price * (1.0 - self.stop_loss_pct);
        let take_profit = entry_price * (1.0 + self.take_profit_pct);

        tracing::info!(
            %id,
            symbol = %symbol,
            entry_price,
            quantity,
            stop_loss,
            take_profit,
            "Opened position"
        );

        self.positions.push(Position {
            id,
            symbol,
            entry_price,
            quantity,
            entry_time,
            stop_loss,
            take_profit,
            status: PositionStatus::Open,
            realized_pnl: None,
            exit_price: None,
            exit_time: None,
            exit_reason: None,
        });
        Ok(id)
    }

    fn get_position_mut(&mut self, position_id: Uuid) -> anyhow::Result<&mut Position> {
        self.positions
            .iter_mut()
            .find(|p| p.id == position_id)
            .ok_or_else(|| anyhow::anyhow!("Position {} not found", position_id))
    }

    /// Exit reason for one position at `price`, if any
    ///
    /// Fixed stop first, then take profit, then a break of the dynamic stop.
    pub fn exit_reason(
        position: &Position,
        price: f64,
        levels: Option<&DynamicLevels>,
    ) -> Option<ExitReason> {
        if price <= position.stop_loss {
            Some(ExitReason::StopLoss)
        } else if price >= position.take_profit {
            Some(ExitReason::TakeProfit)
        } else if levels.is_some_and(|l| price < l.stop_loss) {
            Some(ExitReason::SupportBreak)
        } else {
            None
        }
    }

    /// Close the position and return its realized P&L
    pub fn close_position(
        &mut self,
        position_id: Uuid,
        exit_price: f64,
        reason: ExitReason,
    ) -> anyhow::Result<f64> {
        let position = self.get_position_mut(position_id)?;

        if position.status == PositionStatus::Closed {
            anyhow::bail!("Position {} already closed", position_id);
        }

        let pnl = position.unrealized_pnl(exit_price);
        position.status = PositionStatus::Closed;
        position.realized_pnl = Some(pnl);
        position.exit_price = Some(exit_price);
        position.exit_time = Some(Utc::now());
        position.exit_reason = Some(reason);

        tracing::info!(
            id = %position_id,
            symbol = %position.symbol,
            exit_price,
            pnl,
            reason = %reason,
            "Closed position"
        );

        self.total_pnl += pnl;
        Ok(pnl)
    }

    /// Close every open position on `symbol`, returning the closed ids
    pub fn close_all(
        &mut self,
        symbol: &str,
        exit_price: f64,
        reason: ExitReason,
    ) -> anyhow::Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = self
            .open_positions()
            .filter(|p| p.symbol == symbol)
            .map(|p| p.id)
            .collect();

        for &id in &ids {
            self.close_position(id, exit_price, reason)?;
        }
        Ok(ids)
    }

    /// Close positions on `symbol` that hit a stop, target or support break
    pub fn check_exits(
        &mut self,
        symbol: &str,
        price: f64,
        levels: Option<&DynamicLevels>,
    ) -> anyhow::Result<Vec<(Uuid, ExitReason)>> {
        let to_close: Vec<(Uuid, ExitReason)> = self
            .open_positions()
            .filter(|p| p.symbol == symbol)
            .filter_map(|p| Self::exit_reason(p, price, levels).map(|r| (p.id, r)))
            .collect();

        for &(id, reason) in &to_close {
            self.close_position(id, price, reason)?;
        }
        Ok(to_close)
    }
}
