/// Trading days used to annualize daily-style volatility
pub const PERIODS_PER_YEAR: f64 = 252.0;

/// Sample mean and standard deviation (n - 1 denominator)
fn mean_and_sample_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, variance.sqrt()))
}

/// Z-score of each sample against the trailing `window` samples (inclusive)
///
/// Samples before the window fills, and windows with zero dispersion, are None.
pub fn rolling_zscore(values: &[f64], window: usize) -> Vec<Option<f64>> {
    if window < 2 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let slice = &values[i + 1 - window..=i];
            let (mean, std) = mean_and_sample_std(slice)?;
            let z = (values[i] - mean) / std;
            z.is_finite().then_some(z)
        })
        .collect()
}

/// Percentage change between consecutive values
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Annualized volatility of close-to-close returns
///
/// Needs at least three prices (two returns) for a sample std.
pub fn annualized_volatility(prices: &[f64]) -> Option<f64> {
    let returns = pct_change(prices);
    let (_, std) = mean_and_sample_std(&returns)?;
    Some(std * PERIODS_PER_YEAR.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zscore_window_not_filled() {
        let z = rolling_zscore(&[1.0, 2.0, 3.0], 5);
        assert!(z.iter().all(Option::is_none));
    }

    #[test]
    fn test_zscore_values() {
        let z = rolling_zscore(&[1.0, 2.0, 3.0], 3);
        assert_eq!(z[0], None);
        assert_eq!(z[1], None);
        // mean 2, sample std 1
        assert!((z[2].unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zscore_zero_dispersion_is_undefined() {
        let z = rolling_zscore(&[4.0; 10], 5);
        assert!(z.iter().all(Option::is_none));
    }

    #[test]
    fn test_pct_change() {
        let changes = pct_change(&[100.0, 110.0, 99.0]);
        assert!((changes[0] - 0.1).abs() < 1e-12);
        assert!((changes[1] + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_annualized_volatility() {
        assert!(annualized_volatility(&[100.0, 101.0]).is_none());
        assert_eq!(annualized_volatility(&[100.0, 110.0, 121.0]), Some(0.0));

        let vol = annualized_volatility(&[100.0, 102.0, 100.0, 103.0, 99.0]).unwrap();
        assert!(vol > 0.0);
    }
}
