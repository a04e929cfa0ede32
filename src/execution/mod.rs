// Order execution and the live trading loop
pub mod bot;
pub mod candle_buffer;
pub mod executor;
pub mod gateway;
pub mod position_manager;

pub use bot::{CycleReport, TradingBot};
pub use candle_buffer::CandleBuffer;
pub use executor::{round_quantity, ExecutionAction, ExecutionDecision, Executor};
pub use gateway::{OrderFill, OrderGateway, OrderRequest, SimulatedGateway};
pub use position_manager::{ExitReason, Position, PositionManager, PositionStatus};
