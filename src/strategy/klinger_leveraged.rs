use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::AllocationStrategy;
use crate::indicators::divergence::DEFAULT_DIVERGENCE_WINDOW;
use crate::indicators::{
    annualized_volatility, detect_divergences, DivergenceSeries, IndicatorError, KlingerConfig,
    KlingerOscillator, KlingerSeries,
};
use crate::models::{Candle, DataFeed, Interval, MarketData, TargetAllocation};
use crate::Result;

/// Index whose leveraged ETFs are traded
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Underlying {
    Spy,
    Qqq,
}

impl Underlying {
    pub fn ticker(&self) -> &'static str {
        match self {
            Underlying::Spy => "SPY",
            Underlying::Qqq => "QQQ",
        }
    }
}

/// 3x leveraged ETFs on the supported underlyings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LeveragedEtf {
    /// -3x S&P 500
    Spxu,
    /// -3x NASDAQ-100
    Sqqq,
    /// 3x S&P 500
    Upro,
    /// 3x NASDAQ-100
    Tqqq,
}

impl LeveragedEtf {
    pub fn ticker(&self) -> &'static str {
        match self {
            LeveragedEtf::Spxu => "SPXU",
            LeveragedEtf::Sqqq => "SQQQ",
            LeveragedEtf::Upro => "UPRO",
            LeveragedEtf::Tqqq => "TQQQ",
        }
    }
}

impl fmt::Display for LeveragedEtf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ticker())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Map an underlying and a direction to the ETF that expresses it
pub fn leveraged_etf(underlying: Underlying, direction: Direction) -> LeveragedEtf {
    match (underlying, direction) {
        (Underlying::Spy, Direction::Up) => LeveragedEtf::Upro,
        (Underlying::Qqq, Direction::Up) => LeveragedEtf::Tqqq,
        (Underlying::Spy, Direction::Down) => LeveragedEtf::Spxu,
        (Underlying::Qqq, Direction::Down) => LeveragedEtf::Sqqq,
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeSignal {
    Buy,
    Sell,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KlingerLeveragedConfig {
    pub klinger: KlingerConfig,
    /// Normalized histogram magnitude that counts as a strong reading
    pub hist_threshold: f64,
    pub divergence_window: usize,
    /// First hour (inclusive) in which signals are produced
    pub market_open_hour: u32,
    /// Hour (exclusive) after which signals are suppressed
    pub market_close_hour: u32,
}

impl Default for KlingerLeveragedConfig {
    fn default() -> Self {
        Self {
            klinger: KlingerConfig::default(),
            hist_threshold: 2.0,
            divergence_window: DEFAULT_DIVERGENCE_WINDOW,
            market_open_hour: 9,
            market_close_hour: 16,
        }
    }
}

/// Outcome of one signal evaluation
#[derive(Debug, Clone, Serialize)]
pub struct KlingerTradeSignal {
    pub signal: TradeSignal,
    pub reason: Option<String>,
    pub underlying: Underlying,
    pub leveraged_etf: Option<LeveragedEtf>,
    pub histogram_value: Option<f64>,
    pub kvo_value: Option<f64>,
    pub entry_price: Option<f64>,
    pub position_size: f64,
    pub stop_loss: Option<f64>,
    pub profit_target: Option<f64>,
}

impl KlingerTradeSignal {
    fn none(underlying: Underlying, reason: &str) -> Self {
        Self {
            signal: TradeSignal::None,
            reason: Some(reason.to_string()),
            underlying,
            leveraged_etf: None,
            histogram_value: None,
            kvo_value: None,
            entry_price: None,
            position_size: 0.0,
            stop_loss: None,
            profit_target: None,
        }
    }
}

/// Signal frequency summary over a history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalStats {
    pub total_signals: usize,
    pub avg_signals_per_day: f64,
    /// Signalling bars per signal state change
    pub avg_signal_duration: f64,
}

/// Trades 3x ETFs on strong, divergence-confirmed Klinger readings of the
/// underlying's hourly bars
#[derive(Debug, Clone)]
pub struct KlingerLeveragedStrategy {
    config: KlingerLeveragedConfig,
    oscillator: KlingerOscillator,
    underlying: Underlying,
    assets: Vec<String>,
}

impl KlingerLeveragedStrategy {
    pub fn new(
        underlying: Underlying,
        config: KlingerLeveragedConfig,
    ) -> std::result::Result<Self, IndicatorError> {
        let oscillator = KlingerOscillator::new(config.klinger.clone())?;
        let assets = [Direction::Up, Direction::Down]
            .iter()
            .map(|&d| leveraged_etf(underlying, d).ticker().to_string())
            .chain(std::iter::once(underlying.ticker().to_string()))
            .collect();

        Ok(Self {
            config,
            oscillator,
            underlying,
            assets,
        })
    }

    pub fn config(&self) -> &KlingerLeveragedConfig {
        &self.config
    }

    pub fn underlying(&self) -> Underlying {
        self.underlying
    }

    fn analyze(
        &self,
        candles: &[Candle],
    ) -> std::result::Result<(KlingerSeries, DivergenceSeries), IndicatorError> {
        let series = self.oscillator.calculate(candles)?;
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let divergences = detect_divergences(&closes, &series.kvo, self.config.divergence_window);
        Ok((series, divergences))
    }

    /// Size from histogram strength, scaled down as VIX rises above 15
    pub fn position_size(&self, normalized_histogram: f64, vix: Option<f64>) -> f64 {
        let strength = normalized_histogram.abs();
        let mut size = (strength / self.config.hist_threshold).min(1.0);

        if let Some(vix) = vix {
            let vix_scalar = 1.0 - (vix - 15.0) * 0.02;
            size *= vix_scalar.clamp(0.2, 1.0);
        }

        (size * 100.0).round() / 100.0
    }

    fn in_trading_hours(&self, candle: &Candle) -> bool {
        let hour = candle.timestamp.hour();
        hour >= self.config.market_open_hour && hour < self.config.market_close_hour
    }

    /// Evaluate the latest bar of `candles`
    ///
    /// `vix` is the latest VIX level, used only to scale position size.
    pub fn generate_signal(
        &self,
        candles: &[Candle],
        vix: Option<f64>,
    ) -> std::result::Result<KlingerTradeSignal, IndicatorError> {
        let (series, divergences) = self.analyze(candles)?;
        let Some(latest) = candles.last() else {
            return Ok(KlingerTradeSignal::none(self.underlying, "No data"));
        };

        if !self.in_trading_hours(latest) {
            return Ok(KlingerTradeSignal::none(
                self.underlying,
                "Outside trading hours",
            ));
        }

        let current_hist = series.latest_normalized_histogram();
        let current_kvo = series.latest_kvo();
        let current_price = latest.close;

        let mut result = KlingerTradeSignal {
            signal: TradeSignal::None,
            reason: None,
            underlying: self.underlying,
            leveraged_etf: None,
            histogram_value: current_hist,
            kvo_value: current_kvo,
            entry_price: Some(current_price),
            position_size: 0.0,
            stop_loss: None,
            profit_target: None,
        };

        let (Some(hist), Some(kvo)) = (current_hist, current_kvo) else {
            result.reason = Some("Histogram not yet defined".to_string());
            return Ok(result);
        };

        if hist.abs() > self.config.hist_threshold {
            if hist > 0.0 && kvo > 0.0 && divergences.latest_confirmed_bullish() {
                result.signal = TradeSignal::Buy;
                result.leveraged_etf = Some(leveraged_etf(self.underlying, Direction::Up));
            } else if hist < 0.0 && kvo < 0.0 && divergences.latest_confirmed_bearish() {
                result.signal = TradeSignal::Sell;
                result.leveraged_etf = Some(leveraged_etf(self.underlying, Direction::Down));
            }
        }

        if result.signal != TradeSignal::None {
            result.position_size = self.position_size(hist, vix);

            let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
            if let Some(volatility) = annualized_volatility(&closes) {
                result.stop_loss = Some(current_price * (1.0 - volatility * 1.5));
                result.profit_target = Some(current_price * (1.0 + volatility * 2.5));
            }

            tracing::info!(
                underlying = self.underlying.ticker(),
                signal = ?result.signal,
                etf = ?result.leveraged_etf,
                histogram = hist,
                kvo,
                size = result.position_size,
                "Klinger signal"
            );
        }

        Ok(result)
    }

    /// Signal frequency statistics over the whole history
    pub fn analyze_signals(
        &self,
        candles: &[Candle],
    ) -> std::result::Result<SignalStats, IndicatorError> {
        let (series, _) = self.analyze(candles)?;
        let threshold = self.config.hist_threshold;

        let states: Vec<i8> = series
            .normalized_histogram
            .iter()
            .map(|h| match h {
                Some(h) if *h > threshold => 1,
                Some(h) if *h < -threshold => -1,
                _ => 0,
            })
            .collect();

        let total_signals = states.iter().filter(|&&s| s != 0).count();
        let trading_days: HashSet<_> = candles.iter().map(|c| c.timestamp.date_naive()).collect();
        let state_changes = states.windows(2).filter(|w| w[0] != w[1]).count();

        let avg_signals_per_day = if trading_days.is_empty() {
            0.0
        } else {
            total_signals as f64 / trading_days.len() as f64
        };
        let avg_signal_duration = if state_changes == 0 {
            0.0
        } else {
            total_signals as f64 / state_changes as f64
        };

        Ok(SignalStats {
            total_signals,
            avg_signals_per_day,
            avg_signal_duration,
        })
    }
}

impl AllocationStrategy for KlingerLeveragedStrategy {
    fn name(&self) -> &str {
        "KlingerLeveragedStrategy"
    }

    fn assets(&self) -> &[String] {
        &self.assets
    }

    fn interval(&self) -> Interval {
        Interval::OneHour
    }

    fn feeds(&self) -> &[DataFeed] {
        &[DataFeed::Vix]
    }

    fn run(&self, data: &MarketData) -> Result<TargetAllocation> {
        let ticker = self.underlying.ticker();
        let candles = data
            .candles(ticker)
            .ok_or_else(|| format!("No data for {}", ticker))?;
        let vix = data.latest_feed_value(DataFeed::Vix);

        let signal = self.generate_signal(candles, vix)?;
        Ok(match signal.leveraged_etf {
            Some(etf) => TargetAllocation::from_pairs([(etf.ticker(), signal.position_size)]),
            None => TargetAllocation::empty(),
        })
    }
}
