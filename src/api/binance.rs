use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use thiserror::Error;

use crate::models::Candle;

const BINANCE_API_BASE: &str = "https://api.binance.com";
const RATE_LIMIT_RPS: u32 = 10;

type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Exchange returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Malformed kline at row {row}: {reason}")]
    MalformedKline { row: usize, reason: String },
}

/// Binance spot REST client for market data
///
/// Cloneable; clones share the rate limiter. Requests are not retried.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    rate_limiter: Arc<BinanceRateLimiter>,
}

impl BinanceClient {
    pub fn new() -> Result<Self, ExchangeError> {
        Self::with_base_url(BINANCE_API_BASE)
    }

    /// Client against another host (testnet, mock server)
    pub fn with_base_url(base_url: &str) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        let quota = Quota::per_second(NonZeroU32::new(RATE_LIMIT_RPS).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Most recent `limit` klines, oldest first
    pub async fn fetch_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/api/v3/klines", self.base_url);
        let limit = limit.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol), ("interval", interval), ("limit", limit.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), symbol, "Kline request failed");
            return Err(ExchangeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let rows: Vec<Vec<Value>> = serde_json::from_str(&body)?;
        let candles = rows
            .iter()
            .enumerate()
            .map(|(i, row)| parse_kline(symbol, i, row))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(symbol, interval, count = candles.len(), "Fetched klines");
        Ok(candles)
    }
}

/// Binance encodes prices as strings; accept plain numbers as well
fn number_at(row: &[Value], index: usize, row_index: usize) -> Result<f64, ExchangeError> {
    let malformed = |reason: String| ExchangeError::MalformedKline {
        row: row_index,
        reason,
    };

    match row.get(index) {
        Some(Value::String(s)) => s
            .parse::<f64>()
            .map_err(|_| malformed(format!("field {} is not numeric: {:?}", index, s))),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| malformed(format!("field {} out of range", index))),
        Some(other) => Err(malformed(format!("field {} has type {}", index, other))),
        None => Err(malformed(format!("missing field {}", index))),
    }
}

/// `[open_time_ms, open, high, low, close, volume, ...]`
fn parse_kline(symbol: &str, row_index: usize, row: &[Value]) -> Result<Candle, ExchangeError> {
    let open_time = row
        .first()
        .and_then(Value::as_i64)
        .ok_or_else(|| ExchangeError::MalformedKline {
            row: row_index,
            reason: "open time is not an integer".to_string(),
        })?;
    let timestamp: DateTime<Utc> =
        DateTime::from_timestamp_millis(open_time).ok_or_else(|| ExchangeError::MalformedKline {
            row: row_index,
            reason: format!("open time {} out of range", open_time),
        })?;

    Ok(Candle {
        symbol: symbol.to_string(),
        timestamp,
        open: number_at(row, 1, row_index)?,
        high: number_at(row, 2, row_index)?,
        low: number_at(row, 3, row_index)?,
        close: number_at(row, 4, row_index)?,
        volume: number_at(row, 5, row_index)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_string_fields() {
        let row = json!([1704067200000i64, "42000.1", "42100.0", "41900.5", "42050.0", "12.5", 1704070799999i64]);
        let candle = parse_kline("BTCUSDT", 0, row.as_array().unwrap()).unwrap();

        assert_eq!(candle.symbol, "BTCUSDT");
        assert_eq!(candle.timestamp.timestamp_millis(), 1704067200000);
        assert_eq!(candle.open, 42000.1);
        assert_eq!(candle.low, 41900.5);
        assert_eq!(candle.volume, 12.5);
    }

    #[test]
    fn test_parse_numeric_fields() {
        let row = json!([1704067200000i64, 1.0, 2.0, 0.5, 1.5, 100]);
        let candle = parse_kline("ETHUSDT", 0, row.as_array().unwrap()).unwrap();
        assert_eq!(candle.close, 1.5);
        assert_eq!(candle.volume, 100.0);
    }

    #[test]
    fn test_short_row_is_malformed() {
        let row = json!([1704067200000i64, "1.0", "2.0"]);
        let err = parse_kline("BTCUSDT", 3, row.as_array().unwrap()).unwrap_err();
        assert!(matches!(err, ExchangeError::MalformedKline { row: 3, .. }));
    }

    #[test]
    fn test_non_numeric_price_is_malformed() {
        let row = json!([1704067200000i64, "abc", "2.0", "0.5", "1.5", "10"]);
        assert!(parse_kline("BTCUSDT", 0, row.as_array().unwrap()).is_err());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = BinanceClient::with_base_url("http://localhost:1234/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:1234");
    }
}
