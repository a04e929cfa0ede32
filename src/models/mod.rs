use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// OHLCV candlestick for one interval
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Trading signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Rebalance frequency requested from the strategy host
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Interval {
    OneHour,
    OneDay,
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interval::OneHour => write!(f, "1hour"),
            Interval::OneDay => write!(f, "1day"),
        }
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1hour" | "1h" => Ok(Interval::OneHour),
            "1day" | "1d" => Ok(Interval::OneDay),
            other => Err(format!("Unsupported host interval: {}", other)),
        }
    }
}

/// Parse an exchange interval string (`15m`, `1h`, `1d`) into a duration
///
/// Returns `None` for unknown units, unparsable or zero counts, and counts
/// too large to represent in seconds.
pub fn parse_interval(interval: &str) -> Option<Duration> {
    let unit = interval.chars().last()?;
    let value: u64 = interval[..interval.len() - unit.len_utf8()].parse().ok()?;
    if value == 0 {
        return None;
    }

    let unit_secs: u64 = match unit {
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return None,
    };
    value.checked_mul(unit_secs).map(Duration::from_secs)
}

/// Convert an exchange interval string to a duration, falling back to one
/// minute when [`parse_interval`] rejects it
pub fn interval_to_duration(interval: &str) -> Duration {
    parse_interval(interval).unwrap_or(Duration::from_secs(60))
}

/// Auxiliary (non-ticker) data feeds a strategy may request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DataFeed {
    /// CBOE volatility index level
    Vix,
}

/// Timestamped scalar from an auxiliary feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Per-interval data handed to allocation strategies
#[derive(Debug, Clone, Default)]
pub struct MarketData {
    ohlcv: HashMap<String, Vec<Candle>>,
    feeds: HashMap<DataFeed, Vec<FeedPoint>>,
}

impl MarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candles(mut self, ticker: &str, candles: Vec<Candle>) -> Self {
        self.ohlcv.insert(ticker.to_string(), candles);
        self
    }

    pub fn with_feed(mut self, feed: DataFeed, points: Vec<FeedPoint>) -> Self {
        self.feeds.insert(feed, points);
        self
    }

    pub fn candles(&self, ticker: &str) -> Option<&[Candle]> {
        self.ohlcv.get(ticker).map(Vec::as_slice)
    }

    pub fn closes(&self, ticker: &str) -> Option<Vec<f64>> {
        self.candles(ticker)
            .map(|candles| candles.iter().map(|c| c.close).collect())
    }

    pub fn volumes(&self, ticker: &str) -> Option<Vec<f64>> {
        self.candles(ticker)
            .map(|candles| candles.iter().map(|c| c.volume).collect())
    }

    pub fn latest_close(&self, ticker: &str) -> Option<f64> {
        self.candles(ticker)?.last().map(|c| c.close)
    }

    pub fn feed(&self, feed: DataFeed) -> Option<&[FeedPoint]> {
        self.feeds.get(&feed).map(Vec::as_slice)
    }

    pub fn latest_feed_value(&self, feed: DataFeed) -> Option<f64> {
        self.feed(feed)?.last().map(|p| p.value)
    }

    pub fn tickers(&self) -> Vec<&str> {
        self.ohlcv.keys().map(String::as_str).collect()
    }
}

/// Ticker -> portfolio fraction
///
/// Construction goes through [`TargetAllocation::normalized`], which keeps
/// every weight in [0, 1] and the total at or below 1.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TargetAllocation {
    weights: BTreeMap<String, f64>,
}

impl TargetAllocation {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Clamp negative/non-finite weights to zero and rescale when the sum exceeds 1
    pub fn normalized(weights: BTreeMap<String, f64>) -> Self {
        let mut weights: BTreeMap<String, f64> = weights
            .into_iter()
            .map(|(ticker, w)| {
                let w = if w.is_finite() { w.max(0.0) } else { 0.0 };
                (ticker, w)
            })
            .collect();

        let total: f64 = weights.values().sum();
        if total > 1.0 {
            tracing::debug!(total, "Rescaling allocation to sum to 1");
            for w in weights.values_mut() {
                *w /= total;
            }
        }

        Self { weights }
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self::normalized(pairs.into_iter().map(|(t, w)| (t.into(), w)).collect())
    }

    pub fn get(&self, ticker: &str) -> Option<f64> {
        self.weights.get(ticker).copied()
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(t, w)| (t.as_str(), *w))
    }
}

impl fmt::Display for TargetAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.weights.is_empty() {
            return write!(f, "{{}}");
        }
        let parts: Vec<String> = self
            .weights
            .iter()
            .map(|(t, w)| format!("{}: {:.2}", t, w))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}
