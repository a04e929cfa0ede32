/// Calculate Simple Moving Average (SMA) of the most recent `period` values
pub fn calculate_sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }

    let sum: f64 = values.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Full SMA series
///
/// Returns one value per complete window, so the result is empty when fewer
/// than `period` values are available. The last element is the SMA of the
/// most recent window.
pub fn sma_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let mut series = Vec::with_capacity(values.len() - period + 1);
    let mut window_sum: f64 = values[..period].iter().sum();
    series.push(window_sum / period as f64);

    for i in period..values.len() {
        window_sum += values[i] - values[i - period];
        series.push(window_sum / period as f64);
    }

    series
}

/// Span-based Exponential Moving Average, seeded with the first value
///
/// `alpha = 2 / (span + 1)`; every input sample gets an output sample.
pub fn ema_series(values: &[f64], span: usize) -> Vec<f64> {
    if values.is_empty() || span == 0 {
        return Vec::new();
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut series = Vec::with_capacity(values.len());
    let mut ema = values[0];
    series.push(ema);

    for value in &values[1..] {
        ema = alpha * value + (1.0 - alpha) * ema;
        series.push(ema);
    }

    series
}
