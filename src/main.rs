use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use strategybot::config::BotConfig;
use strategybot::execution::{SimulatedGateway, TradingBot};
use strategybot::models::DataFeed;
use strategybot::strategy::klinger_leveraged::KlingerLeveragedConfig;
use strategybot::strategy::{
    evaluate, AllocationStrategy, KlingerLeveragedStrategy, SmaCrossoverStrategy,
    SmaRegimeStrategy, Underlying, VixRegimeStrategy, VolumeMacdStrategy,
};
use strategybot::synthetic::SyntheticMarket;
use strategybot::{BinanceClient, Result};
use tracing_subscriber::EnvFilter;

/// Bars of synthetic history per allocation strategy
const ALLOCATION_BARS: usize = 250;
/// ~100 regular sessions of hourly bars
const KLINGER_BARS: usize = 700;

#[derive(Parser)]
#[command(name = "strategybot")]
#[command(about = "Klinger trading bot and allocation strategies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the live Klinger bot with simulated order execution
    Bot {
        /// Config file (toml, yaml or json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Trading pair, overrides the config (e.g. BTCUSDT)
        #[arg(short, long)]
        symbol: Option<String>,

        /// Kline interval, overrides the config (15m, 1h, 1d)
        #[arg(short, long)]
        interval: Option<String>,
    },

    /// Run every allocation strategy on synthetic data
    Allocate {
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Klinger leveraged-ETF signal and statistics on synthetic hourly data
    Klinger {
        #[arg(long, default_value = "42")]
        seed: u64,

        #[arg(short, long, value_enum, default_value = "spy")]
        underlying: UnderlyingArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum UnderlyingArg {
    Spy,
    Qqq,
}

impl From<UnderlyingArg> for Underlying {
    fn from(arg: UnderlyingArg) -> Self {
        match arg {
            UnderlyingArg::Spy => Underlying::Spy,
            UnderlyingArg::Qqq => Underlying::Qqq,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    match cli.command {
        Commands::Bot {
            config,
            symbol,
            interval,
        } => run_bot(config, symbol, interval).await,
        Commands::Allocate { seed } => run_allocations(seed),
        Commands::Klinger { seed, underlying } => run_klinger(seed, underlying.into()),
    }
}

fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("strategybot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_bot(
    config_path: Option<PathBuf>,
    symbol: Option<String>,
    interval: Option<String>,
) -> Result<()> {
    let mut config = BotConfig::load(config_path.as_deref())?;
    if let Some(symbol) = symbol {
        config.symbol = symbol;
    }
    if let Some(interval) = interval {
        config.interval = interval;
    }

    tracing::info!("📊 Configuration:");
    tracing::info!("  Exchange: {} ({})", config.exchange, config.base_url);
    tracing::info!("  Symbol: {} @ {}", config.symbol, config.interval);
    tracing::info!(
        "  Klinger: {}/{}/{}",
        config.short_period,
        config.long_period,
        config.signal_period
    );
    tracing::info!(
        "  Position size: {:.0}%, stop {:.1}%, take profit {:.1}%",
        config.max_position_size * 100.0,
        config.stop_loss_pct * 100.0,
        config.take_profit_pct * 100.0
    );
    if config.api_key.is_none() {
        tracing::info!("  No API key configured, orders are simulated");
    }

    let client = BinanceClient::with_base_url(&config.base_url)?;
    let gateway = Arc::new(SimulatedGateway::new(config.initial_balance));
    let mut bot = TradingBot::new(config, client, gateway)?;

    tracing::info!("Press Ctrl+C to stop...");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("⚠️  Received Ctrl+C, shutting down...");
        }
        result = bot.start() => {
            if let Err(e) = result {
                tracing::error!("Bot failed to start: {}", e);
                return Err(e);
            }
        }
    }

    tracing::info!("👋 strategybot stopped");
    Ok(())
}

fn run_allocations(seed: u64) -> Result<()> {
    let strategies: Vec<Box<dyn AllocationStrategy>> = vec![
        Box::new(SmaRegimeStrategy::default()),
        Box::new(VolumeMacdStrategy::default()),
        Box::new(SmaCrossoverStrategy::default()),
        Box::new(VixRegimeStrategy::default()),
        Box::new(KlingerLeveragedStrategy::new(
            Underlying::Spy,
            KlingerLeveragedConfig::default(),
        )?),
    ];

    let mut market = SyntheticMarket::new(seed);
    println!("\n{:<26} {:<6} ALLOCATION", "STRATEGY", "EVERY");
    println!("{}", "-".repeat(70));

    for strategy in &strategies {
        let data = market.market_data(strategy.as_ref(), ALLOCATION_BARS);
        let allocation = evaluate(strategy.as_ref(), &data);
        println!(
            "{:<26} {:<6} {}",
            strategy.name(),
            strategy.interval().to_string(),
            allocation
        );
    }

    Ok(())
}

fn run_klinger(seed: u64, underlying: Underlying) -> Result<()> {
    let strategy = KlingerLeveragedStrategy::new(underlying, KlingerLeveragedConfig::default())?;
    let mut market = SyntheticMarket::new(seed);
    let data = market.market_data(&strategy, KLINGER_BARS);

    let candles = data
        .candles(underlying.ticker())
        .ok_or_else(|| format!("No synthetic data for {}", underlying.ticker()))?;
    let vix = data.latest_feed_value(DataFeed::Vix);

    let signal = strategy.generate_signal(candles, vix)?;
    let stats = strategy.analyze_signals(candles)?;

    println!("\nKlinger leveraged strategy on {}", underlying.ticker());
    println!("{}", "-".repeat(50));
    if let Some(last) = candles.last() {
        println!("Last bar:           {}", last.timestamp.format("%Y-%m-%d %H:%M"));
    }
    println!("VIX:                {}", fmt_opt(vix));
    println!("Signal:             {:?}", signal.signal);
    if let Some(reason) = &signal.reason {
        println!("Reason:             {}", reason);
    }
    if let Some(etf) = signal.leveraged_etf {
        println!("ETF:                {}", etf);
    }
    println!("Histogram (z):      {}", fmt_opt(signal.histogram_value));
    println!("KVO:                {}", fmt_opt(signal.kvo_value));
    println!("Entry:              {}", fmt_opt(signal.entry_price));
    println!("Position size:      {:.2}", signal.position_size);
    println!("Stop loss:          {}", fmt_opt(signal.stop_loss));
    println!("Profit target:      {}", fmt_opt(signal.profit_target));
    println!("\nSignal statistics over {} bars", candles.len());
    println!("  Total signals:        {}", stats.total_signals);
    println!("  Signals per day:      {:.2}", stats.avg_signals_per_day);
    println!("  Avg signal duration:  {:.2} bars", stats.avg_signal_duration);

    Ok(())
}

fn fmt_opt(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.4}", v))
        .unwrap_or_else(|| "n/a".to_string())
}
