//! Average True Range (ATR) indicator
//!
//! Measures market volatility by calculating the average of true ranges over a period.
//! True Range is the greatest of:
//! - Current High - Current Low
//! - Abs(Current High - Previous Close)
//! - Abs(Current Low - Previous Close)
//!
//! Uses Wilder's smoothing for the moving average.

use crate::models::Candle;

fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .windows(2)
        .map(|w| {
            let (prev, cur) = (&w[0], &w[1]);
            (cur.high - cur.low)
                .max((cur.high - prev.close).abs())
                .max((cur.low - prev.close).abs())
        })
        .collect()
}

/// Calculate ATR for the given candles
///
/// Returns the current ATR value, or None if insufficient data
pub fn calculate_atr(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let ranges = true_ranges(candles);

    // First ATR is simple average of first 'period' true ranges
    let mut atr: f64 = ranges.iter().take(period).sum::<f64>() / period as f64;

    for tr in &ranges[period..] {
        atr = (atr * (period as f64 - 1.0) + tr) / period as f64;
    }

    Some(atr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn create_candles(data: &[(f64, f64, f64)]) -> Vec<Candle> {
        let start = Utc::now();
        data.iter()
            .enumerate()
            .map(|(i, &(high, low, close))| Candle {
                symbol: "TEST".to_string(),
                timestamp: start + Duration::hours(i as i64),
                open: close,
                high,
                low,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_atr_insufficient_data() {
        let candles = create_candles(&[(101.0, 99.0, 100.0), (102.0, 100.0, 101.0)]);
        assert!(calculate_atr(&candles, 14).is_none());
    }

    #[test]
    fn test_atr_constant_range() {
        // Every bar spans 2.0 with no gaps between bars
        let data: Vec<(f64, f64, f64)> = (0..20).map(|_| (101.0, 99.0, 100.0)).collect();
        let candles = create_candles(&data);

        let atr = calculate_atr(&candles, 14).unwrap();
        assert!((atr - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_atr_includes_gap_from_previous_close() {
        let candles = create_candles(&[(101.0, 99.0, 100.0), (111.0, 109.0, 110.0)]);
        // High - previous close = 11 dominates the 2.0 bar range
        assert_eq!(calculate_atr(&candles, 1), Some(11.0));
    }
}
