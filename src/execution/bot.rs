use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::time::{interval_at, Instant};
use uuid::Uuid;

use crate::api::BinanceClient;
use crate::config::BotConfig;
use crate::execution::{
    CandleBuffer, ExecutionAction, ExecutionDecision, Executor, ExitReason, OrderGateway,
    OrderRequest, PositionManager,
};
use crate::models::{interval_to_duration, parse_interval, Signal, TradeSide};
use crate::strategy::signals::{validate_candle_uniformity, DynamicLevels, KlingerSignalGenerator};
use crate::Result;

/// What one trading cycle did
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub price: f64,
    pub signal: Signal,
    /// Present when the signal changed and was acted on
    pub decision: Option<ExecutionDecision>,
    pub levels: Option<DynamicLevels>,
    pub exits: Vec<(Uuid, ExitReason)>,
}

/// Single-symbol Klinger trading loop
pub struct TradingBot {
    config: BotConfig,
    client: BinanceClient,
    gateway: Arc<dyn OrderGateway>,
    generator: KlingerSignalGenerator,
    buffer: CandleBuffer,
    position_manager: Arc<Mutex<PositionManager>>,
    executor: Executor,
    last_signal: Option<Signal>,
}

impl TradingBot {
    pub fn new(
        config: BotConfig,
        client: BinanceClient,
        gateway: Arc<dyn OrderGateway>,
    ) -> Result<Self> {
        config.validate()?;
        let generator = KlingerSignalGenerator::new(config.signal_config())?;
        let capacity = generator.config().min_data_points();
        let position_manager = Arc::new(Mutex::new(PositionManager::new(
            config.stop_loss_pct,
            config.take_profit_pct,
        )));
        let executor = Executor::new(position_manager.clone(), config.max_position_size);

        Ok(Self {
            config,
            client,
            gateway,
            generator,
            buffer: CandleBuffer::new(capacity),
            position_manager,
            executor,
            last_signal: None,
        })
    }

    pub fn position_manager(&self) -> Arc<Mutex<PositionManager>> {
        self.position_manager.clone()
    }

    pub fn candle_buffer(&self) -> &CandleBuffer {
        &self.buffer
    }

    pub fn last_signal(&self) -> Option<Signal> {
        self.last_signal
    }

    fn positions(&self) -> anyhow::Result<MutexGuard<'_, PositionManager>> {
        self.position_manager
            .lock()
            .map_err(|e| anyhow::anyhow!("Position manager lock poisoned: {}", e))
    }

    /// Fill the buffer with enough history for the oscillator
    pub async fn load_history(&self) -> Result<usize> {
        let needed = self.generator.config().min_data_points();
        let candles = self
            .client
            .fetch_klines(&self.config.symbol, &self.config.interval, needed)
            .await?;

        if candles.len() < needed {
            tracing::warn!(
                symbol = %self.config.symbol,
                loaded = candles.len(),
                needed,
                "Exchange returned less history than requested"
            );
        }

        let count = candles.len();
        self.buffer.load(&self.config.symbol, candles)?;
        tracing::info!(symbol = %self.config.symbol, count, "Loaded historical candles");
        Ok(count)
    }

    /// Load history, then trade every interval until the task is dropped
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!(
            symbol = %self.config.symbol,
            interval = %self.config.interval,
            "🚀 Starting Klinger trading bot"
        );
        let period = parse_interval(&self.config.interval)
            .ok_or_else(|| format!("Invalid interval: {}", self.config.interval))?;
        self.load_history().await?;

        self.run_cycle().await;

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            tracing::debug!("Tick at {}", Utc::now().format("%H:%M:%S"));
            self.run_cycle().await;
        }
    }

    /// One cycle with errors logged instead of propagated
    pub async fn run_cycle(&mut self) -> Option<CycleReport> {
        match self.check_and_trade().await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(symbol = %self.config.symbol, error = %e, "Trading cycle failed, skipping");
                None
            }
        }
    }

    pub async fn check_and_trade(&mut self) -> Result<CycleReport> {
        let symbol = self.config.symbol.clone();

        let latest = self
            .client
            .fetch_klines(&symbol, &self.config.interval, 2)
            .await?
            .pop()
            .ok_or_else(|| format!("No klines returned for {}", symbol))?;
        self.buffer.upsert(latest)?;

        let candles = self.buffer.get_candles(&symbol)?;
        let needed = self.generator.config().min_data_points();
        if candles.len() < needed {
            return Err(format!(
                "Insufficient history: {} candles, need {}",
                candles.len(),
                needed
            )
            .into());
        }

        let expected_secs = interval_to_duration(&self.config.interval).as_secs();
        if let Err(e) = validate_candle_uniformity(&candles, expected_secs) {
            tracing::warn!(symbol = %symbol, "{}", e);
        }

        let price = candles
            .last()
            .map(|c| c.close)
            .ok_or("Candle buffer is empty")?;
        let evaluation = self.generator.evaluate(&candles)?;
        let signal = evaluation.signal;
        let levels = evaluation
            .critical_levels
            .map(|critical| self.generator.dynamic_levels(&candles, &critical));

        let decision = if self.last_signal != Some(signal) {
            tracing::info!(
                symbol = %symbol,
                signal = %signal,
                previous = ?self.last_signal,
                price,
                "Signal changed"
            );
            let balance = self.gateway.available_balance().await?;
            let decision = self
                .executor
                .process_signal(signal, &symbol, price, balance)?;
            self.execute(&symbol, price, &decision).await?;
            self.last_signal = Some(signal);
            Some(decision)
        } else {
            None
        };

        let exits = self.manage_positions(&symbol, price, levels.as_ref()).await?;

        self.log_state(&symbol, price, signal, &evaluation.series, levels.as_ref())?;

        Ok(CycleReport {
            price,
            signal,
            decision,
            levels,
            exits,
        })
    }

    async fn execute(&self, symbol: &str, price: f64, decision: &ExecutionDecision) -> Result<()> {
        match decision.action {
            ExecutionAction::Buy { quantity } => {
                let fill = self
                    .gateway
                    .place_order(OrderRequest {
                        symbol: symbol.to_string(),
                        side: TradeSide::Buy,
                        quantity,
                        price,
                    })
                    .await?;
                self.positions()?
                    .open_position(symbol.to_string(), fill.price, fill.quantity)?;
                tracing::info!(symbol, quantity, price, reason = %decision.reason, "✅ BUY executed");
            }
            ExecutionAction::CloseAll { quantity } => {
                let fill = self
                    .gateway
                    .place_order(OrderRequest {
                        symbol: symbol.to_string(),
                        side: TradeSide::Sell,
                        quantity,
                        price,
                    })
                    .await?;
                let closed =
                    self.positions()?
                        .close_all(symbol, fill.price, ExitReason::StrategySell)?;
                tracing::info!(symbol, positions = closed.len(), price, "✅ SELL executed");
            }
            ExecutionAction::Skip => {
                tracing::info!(symbol, reason = %decision.reason, "⏭️  Skipping");
            }
        }
        Ok(())
    }

    /// Close positions that hit their stops and send the matching sell
    async fn manage_positions(
        &self,
        symbol: &str,
        price: f64,
        levels: Option<&DynamicLevels>,
    ) -> Result<Vec<(Uuid, ExitReason)>> {
        let (exits, quantity) = {
            let mut pm = self.positions()?;
            let exits = pm.check_exits(symbol, price, levels)?;
            let quantity: f64 = pm
                .all_positions()
                .iter()
                .filter(|p| exits.iter().any(|(id, _)| *id == p.id))
                .map(|p| p.quantity)
                .sum();
            (exits, quantity)
        };

        if !exits.is_empty() {
            for (id, reason) in &exits {
                tracing::warn!(symbol, %id, reason = %reason, price, "🚨 Exit triggered");
            }
            self.gateway
                .place_order(OrderRequest {
                    symbol: symbol.to_string(),
                    side: TradeSide::Sell,
                    quantity,
                    price,
                })
                .await?;
        }

        Ok(exits)
    }

    fn log_state(
        &self,
        symbol: &str,
        price: f64,
        signal: Signal,
        series: &crate::indicators::KlingerSeries,
        levels: Option<&DynamicLevels>,
    ) -> Result<()> {
        let pm = self.positions()?;
        tracing::info!(
            symbol,
            price,
            signal = %signal,
            kvo = ?series.latest_kvo(),
            histogram = ?series.latest_histogram(),
            stop = ?levels.map(|l| l.stop_loss),
            target = ?levels.map(|l| l.take_profit),
            open_positions = pm.open_positions().count(),
            unrealized_pnl = pm.unrealized_pnl(symbol, price),
            realized_pnl = pm.total_pnl(),
            "📊 Bot state"
        );
        Ok(())
    }
}
