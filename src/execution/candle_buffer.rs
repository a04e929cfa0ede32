use crate::models::Candle;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe rolling candle history per symbol
///
/// Candles are kept in timestamp order. The buffer may grow to 1.5x its
/// capacity before being trimmed back to the newest `capacity` candles.
#[derive(Clone)]
pub struct CandleBuffer {
    data: Arc<RwLock<HashMap<String, Vec<Candle>>>>,
    capacity: usize,
}

impl CandleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Replace the candle with the same timestamp, or insert a new one in
    /// timestamp order
    ///
    /// Returns true when the candle was added.
    pub fn upsert(&self, candle: Candle) -> Result<bool, String> {
        let mut data = self.data.write().map_err(|e| e.to_string())?;
        let candles = data.entry(candle.symbol.clone()).or_default();

        match candles.binary_search_by_key(&candle.timestamp, |c| c.timestamp) {
            Ok(index) => {
                candles[index] = candle;
                return Ok(false);
            }
            Err(index) => candles.insert(index, candle),
        }

        if candles.len() > self.capacity + self.capacity / 2 {
            let excess = candles.len() - self.capacity;
            candles.drain(..excess);
        }
        Ok(true)
    }

    /// Replace the history for a symbol, keeping the newest `capacity` candles
    pub fn load(&self, symbol: &str, mut candles: Vec<Candle>) -> Result<(), String> {
        candles.sort_by_key(|c| c.timestamp);
        let excess = candles.len().saturating_sub(self.capacity);
        candles.drain(..excess);

        let mut data = self.data.write().map_err(|e| e.to_string())?;
        data.insert(symbol.to_string(), candles);
        Ok(())
    }

    pub fn get_candles(&self, symbol: &str) -> Result<Vec<Candle>, String> {
        let data = self.data.read().map_err(|e| e.to_string())?;
        Ok(data.get(symbol).cloned().unwrap_or_default())
    }

    pub fn latest(&self, symbol: &str) -> Result<Option<Candle>, String> {
        let data = self.data.read().map_err(|e| e.to_string())?;
        Ok(data.get(symbol).and_then(|c| c.last().cloned()))
    }

    pub fn candle_count(&self, symbol: &str) -> Result<usize, String> {
        let data = self.data.read().map_err(|e| e.to_string())?;
        Ok(data.get(symbol).map(|c| c.len()).unwrap_or(0))
    }
}
