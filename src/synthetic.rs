//! Seeded synthetic market data
//!
//! Used by the `allocate` and `klinger` commands to exercise strategies
//! without a market data vendor. Hourly bars only cover the regular session
//! (09:00-15:00 bar starts, UTC, weekdays) and carry the intraday U-shaped
//! volume profile the Klinger time normalization removes.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

use crate::models::{Candle, DataFeed, FeedPoint, Interval, MarketData};
use crate::strategy::AllocationStrategy;

const SESSION_OPEN_HOUR: u32 = 9;
const SESSION_LAST_BAR_HOUR: u32 = 15;
const DAILY_BAR_HOUR: u32 = 21;

pub struct SyntheticMarket {
    rng: StdRng,
    start: DateTime<Utc>,
    base_volume: f64,
}

fn is_weekday(t: &DateTime<Utc>) -> bool {
    !matches!(t.weekday(), Weekday::Sat | Weekday::Sun)
}

impl SyntheticMarket {
    /// Create a generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            start: Utc
                .with_ymd_and_hms(2024, 1, 2, 0, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
            base_volume: 1_000_000.0,
        }
    }

    /// Start times of `bars` consecutive regular-session hourly bars
    pub fn session_timestamps(&self, bars: usize) -> Vec<DateTime<Utc>> {
        let mut out = Vec::with_capacity(bars);
        let mut t = self.start + Duration::hours(i64::from(SESSION_OPEN_HOUR));
        while out.len() < bars {
            let hour = t.hour();
            if is_weekday(&t) && (SESSION_OPEN_HOUR..=SESSION_LAST_BAR_HOUR).contains(&hour) {
                out.push(t);
            }
            t += Duration::hours(1);
        }
        out
    }

    /// Timestamps of `bars` consecutive weekday daily bars
    pub fn daily_timestamps(&self, bars: usize) -> Vec<DateTime<Utc>> {
        let mut out = Vec::with_capacity(bars);
        let mut t = self.start + Duration::hours(i64::from(DAILY_BAR_HOUR));
        while out.len() < bars {
            if is_weekday(&t) {
                out.push(t);
            }
            t += Duration::days(1);
        }
        out
    }

    /// Intraday volume multiplier: high at the open and close, low at midday
    fn volume_profile(hour: u32) -> f64 {
        if !(SESSION_OPEN_HOUR..=SESSION_LAST_BAR_HOUR).contains(&hour) {
            return 1.0;
        }
        let position =
            f64::from(hour - SESSION_OPEN_HOUR) / f64::from(SESSION_LAST_BAR_HOUR - SESSION_OPEN_HOUR);
        1.0 + 0.5 * (2.0 * PI * position).cos()
    }

    /// Uniform sample from `low..high`, or `low` when the range is empty
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        if high > low {
            self.rng.gen_range(low..high)
        } else {
            low
        }
    }

    /// Random-walk candles over the given timestamps
    ///
    /// `volatility` is the maximum per-bar return magnitude; `drift` is added
    /// to every bar's return. A non-positive volatility gives a pure drift path.
    pub fn candles(
        &mut self,
        symbol: &str,
        timestamps: &[DateTime<Utc>],
        base_price: f64,
        drift: f64,
        volatility: f64,
    ) -> Vec<Candle> {
        let volatility = volatility.max(0.0);
        let mut candles = Vec::with_capacity(timestamps.len());
        let mut close = base_price;

        for &timestamp in timestamps {
            let open = close;
            let ret = drift + self.uniform(-volatility, volatility);
            close = (open * (1.0 + ret)).max(0.01);

            let high = open.max(close) * (1.0 + self.uniform(0.0, volatility / 2.0));
            let low = open.min(close) * (1.0 - self.uniform(0.0, volatility / 2.0));
            let volume = self.base_volume
                * Self::volume_profile(timestamp.hour())
                * self.rng.gen_range(0.7..1.3);

            candles.push(Candle {
                symbol: symbol.to_string(),
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        candles
    }

    /// Mean-reverting VIX around 18, floored at 9
    pub fn vix(&mut self, timestamps: &[DateTime<Utc>]) -> Vec<FeedPoint> {
        let mut level: f64 = self.rng.gen_range(12.0..26.0);
        timestamps
            .iter()
            .map(|&timestamp| {
                level += (18.0 - level) * 0.05 + self.rng.gen_range(-1.0..1.0);
                level = level.max(9.0);
                FeedPoint {
                    timestamp,
                    value: level,
                }
            })
            .collect()
    }

    fn timestamps(&self, interval: Interval, bars: usize) -> Vec<DateTime<Utc>> {
        match interval {
            Interval::OneHour => self.session_timestamps(bars),
            Interval::OneDay => self.daily_timestamps(bars),
        }
    }

    /// Everything a strategy asks its host for, at its own interval
    pub fn market_data(&mut self, strategy: &dyn AllocationStrategy, bars: usize) -> MarketData {
        let interval = strategy.interval();
        let timestamps = self.timestamps(interval, bars);
        let volatility = match interval {
            Interval::OneHour => 0.004,
            Interval::OneDay => 0.02,
        };

        let mut data = MarketData::new();
        for asset in strategy.assets() {
            let base_price = self.rng.gen_range(20.0..400.0);
            let drift = self.rng.gen_range(-volatility / 10.0..volatility / 10.0);
            let candles = self.candles(asset, &timestamps, base_price, drift, volatility);
            data = data.with_candles(asset, candles);
        }

        for &feed in strategy.feeds() {
            let points = match feed {
                DataFeed::Vix => self.vix(&timestamps),
            };
            data = data.with_feed(feed, points);
        }

        tracing::debug!(
            strategy = strategy.name(),
            interval = %interval,
            bars,
            "Generated synthetic market data"
        );
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{SmaRegimeStrategy, VixRegimeStrategy};

    #[test]
    fn test_same_seed_same_data() {
        let mut a = SyntheticMarket::new(7);
        let mut b = SyntheticMarket::new(7);
        let ts = a.session_timestamps(50);

        let ca = a.candles("SPY", &ts, 470.0, 0.0, 0.004);
        let cb = b.candles("SPY", &ts, 470.0, 0.0, 0.004);
        assert_eq!(ca, cb);
    }

    #[test]
    fn test_session_bars_inside_market_hours() {
        let market = SyntheticMarket::new(1);
        let ts = market.session_timestamps(100);

        assert_eq!(ts.len(), 100);
        for t in &ts {
            assert!((9..=15).contains(&t.hour()));
            assert!(is_weekday(t));
        }
        assert!(ts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_volume_profile_is_u_shaped() {
        let open = SyntheticMarket::volume_profile(9);
        let midday = SyntheticMarket::volume_profile(12);
        let close = SyntheticMarket::volume_profile(15);
        assert!(open > midday);
        assert!(close > midday);
    }

    #[test]
    fn test_candles_are_consistent() {
        let mut market = SyntheticMarket::new(3);
        let ts = market.daily_timestamps(60);
        for c in market.candles("QQQ", &ts, 400.0, 0.0, 0.02) {
            assert!(c.low <= c.open.min(c.close));
            assert!(c.high >= c.open.max(c.close));
            assert!(c.volume > 0.0);
        }
    }

    #[test]
    fn test_zero_volatility_is_pure_drift() {
        let mut market = SyntheticMarket::new(3);
        let timestamps = market.session_timestamps(10);

        let flat = market.candles("SPY", &timestamps, 100.0, 0.0, 0.0);
        assert!(flat.iter().all(|c| c.close == 100.0 && c.high == 100.0 && c.low == 100.0));

        let negative = market.candles("SPY", &timestamps, 100.0, 0.01, -0.5);
        assert!(negative.windows(2).all(|w| w[1].close > w[0].close));
    }

    #[test]
    fn test_market_data_covers_strategy_needs() {
        let mut market = SyntheticMarket::new(11);

        let regime = SmaRegimeStrategy::default();
        let data = market.market_data(&regime, 250);
        for asset in regime.assets() {
            assert_eq!(data.candles(asset).map(|c| c.len()), Some(250));
        }

        let vix = VixRegimeStrategy::default();
        let data = market.market_data(&vix, 20);
        assert!(data.latest_feed_value(DataFeed::Vix).unwrap() >= 9.0);
    }
}
