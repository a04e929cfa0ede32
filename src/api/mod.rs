pub mod binance;

pub use binance::{BinanceClient, ExchangeError};
