//! Price / oscillator divergence detection
//!
//! Uses a centered rolling window: a bar is a local price high when its close
//! is the window maximum, and the divergence is bearish when the oscillator
//! did not make its own window maximum at that bar. Bullish is the mirror
//! image on lows. Bars whose centered window runs past either end of the
//! series carry no flag.

pub const DEFAULT_DIVERGENCE_WINDOW: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct DivergenceSeries {
    pub window: usize,
    pub bullish: Vec<bool>,
    pub bearish: Vec<bool>,
}

impl DivergenceSeries {
    /// Index of the most recent bar whose centered window is complete
    pub fn latest_confirmed_index(&self) -> Option<usize> {
        let half = self.window / 2;
        self.bullish.len().checked_sub(half + 1)
    }

    pub fn latest_confirmed_bullish(&self) -> bool {
        self.latest_confirmed_index()
            .map(|i| self.bullish[i])
            .unwrap_or(false)
    }

    pub fn latest_confirmed_bearish(&self) -> bool {
        self.latest_confirmed_index()
            .map(|i| self.bearish[i])
            .unwrap_or(false)
    }
}

fn centered_extremes(values: &[f64], window: usize) -> Vec<Option<(f64, f64)>> {
    let half = window / 2;
    (0..values.len())
        .map(|i| {
            if i < half || i + (window - 1 - half) >= values.len() {
                return None;
            }
            let slice = &values[i - half..=i + (window - 1 - half)];
            let max = slice.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let min = slice.iter().copied().fold(f64::INFINITY, f64::min);
            Some((min, max))
        })
        .collect()
}

/// Flag bullish and bearish divergences between `closes` and `oscillator`
///
/// Both slices must be aligned; the shorter length wins. A bar never carries
/// both flags: when the close is simultaneously the window high and low
/// (flat prices) neither flag is set.
pub fn detect_divergences(closes: &[f64], oscillator: &[f64], window: usize) -> DivergenceSeries {
    let len = closes.len().min(oscillator.len());
    let window = window.max(1);
    let price_extremes = centered_extremes(&closes[..len], window);
    let osc_extremes = centered_extremes(&oscillator[..len], window);

    let mut bullish = vec![false; len];
    let mut bearish = vec![false; len];

    for i in 0..len {
        let (Some((price_low, price_high)), Some((osc_low, osc_high))) =
            (price_extremes[i], osc_extremes[i])
        else {
            continue;
        };

        let is_bearish = closes[i] >= price_high && oscillator[i] < osc_high;
        let is_bullish = closes[i] <= price_low && oscillator[i] > osc_low;

        if is_bearish && is_bullish {
            continue;
        }
        bearish[i] = is_bearish;
        bullish[i] = is_bullish;
    }

    DivergenceSeries {
        window,
        bullish,
        bearish,
    }
}
