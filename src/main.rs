/// Binance futures monitor - command line entry point
///
/// Setup:
/// 1. Create .env file with credentials:
///    - BINANCE_API_KEY, BINANCE_API_SECRET (position view)
///    - TELEGRAM_BOT_TOKEN, TELEGRAM_CHAT_ID (--telegram)
///    - WALLET_TARGET (optional progress bar)
///
/// 2. List symbols with leverage and stop-loss percent in config/coins.json
///
/// 3. Run: moon-monitor monitor price --live
///
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use moon_monitor::monitor::DEFAULT_REFRESH_SECS;
use moon_monitor::trade::DEFAULT_MARGIN_USD;
use moon_monitor::{
    display, init_logging, plan_trades, run_position_monitor, run_price_monitor, BinanceClient,
    CoinsConfig, MonitorError, PositionOptions, PositionSide, PositionSortKey, PriceOptions,
    PriceSortKey, Settings, SortSpec, TelegramNotifier, TradeRequest, DEFAULT_CONFIG_PATH,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::warn;

/// One day
const MAX_REFRESH_SECS: u64 = 86_400;
/// One week
const MAX_TELEGRAM_INTERVAL_MINUTES: u64 = 10_080;

#[derive(Parser, Debug)]
#[command(name = "moon-monitor", version, about = "Binance USDⓈ-M futures price and position monitor")]
struct Cli {
    /// Coins config file (symbol -> leverage, stop_loss_percent)
    #[arg(long, global = true, env = "COINS_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Price and position monitors
    Monitor {
        #[command(subcommand)]
        view: MonitorCommand,
    },
    /// Trade planning
    Trade {
        #[command(subcommand)]
        action: TradeCommand,
    },
}

#[derive(Subcommand, Debug)]
enum MonitorCommand {
    /// Price changes over 15m, 1h, since Asia 8AM and 24h
    Price(PriceArgs),
    /// Open positions with PnL and stop-loss risk
    Position(PositionArgs),
}

#[derive(Subcommand, Debug)]
enum TradeCommand {
    /// Dry-run plan for opening one trade per symbol
    OpenTrades(OpenTradesArgs),
}

#[derive(clap::Args, Debug)]
struct PriceArgs {
    /// Redraw until Ctrl-C
    #[arg(long)]
    live: bool,

    /// Seconds between live refreshes
    #[arg(long, default_value_t = DEFAULT_REFRESH_SECS, value_parser = clap::value_parser!(u64).range(1..=MAX_REFRESH_SECS))]
    refresh: u64,

    /// default, change_15m, change_1h, change_asia or change_24h, with optional :asc / :desc
    #[arg(long, default_value = "default")]
    sort: SortSpec<PriceSortKey>,

    /// Send the table to Telegram
    #[arg(long)]
    telegram: bool,

    /// Repeat and send every N minutes (implies --telegram)
    #[arg(long, value_name = "MINUTES", value_parser = clap::value_parser!(u64).range(1..=MAX_TELEGRAM_INTERVAL_MINUTES))]
    telegram_interval: Option<u64>,
}

#[derive(clap::Args, Debug)]
struct PositionArgs {
    /// default, pnl_pct or sl_usd, with optional :asc / :desc
    #[arg(long, default_value = "default")]
    sort: SortSpec<PositionSortKey>,

    /// Hide configured symbols without an open position
    #[arg(long)]
    hide_empty: bool,

    /// Wallet summary only
    #[arg(long)]
    compact: bool,

    /// Send the summary to Telegram
    #[arg(long)]
    telegram: bool,

    /// Repeat and send every N minutes (implies --telegram)
    #[arg(long, value_name = "MINUTES", value_parser = clap::value_parser!(u64).range(1..=MAX_TELEGRAM_INTERVAL_MINUTES))]
    telegram_interval: Option<u64>,
}

#[derive(clap::Args, Debug)]
struct OpenTradesArgs {
    /// Margin per trade in USD
    #[arg(long, default_value_t = DEFAULT_MARGIN_USD, value_parser = parse_positive_usd)]
    usd: f64,

    #[arg(long, value_enum, default_value_t = SideArg::Long)]
    side: SideArg,

    /// Symbols to plan (default: every configured symbol)
    symbols: Vec<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SideArg {
    Long,
    Short,
}

impl From<SideArg> for PositionSide {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Long => PositionSide::Long,
            SideArg::Short => PositionSide::Short,
        }
    }
}

fn parse_positive_usd(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|_| format!("'{}' is not a number", raw))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("'{}' must be greater than zero", raw))
    }
}

fn minutes(value: Option<u64>) -> Option<Duration> {
    value.map(|m| Duration::from_secs(m.saturating_mul(60)))
}

fn main() -> ExitCode {
    // Load environment variables before clap reads env-backed flags
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("❌ Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// 2 for configuration / input errors, 1 for everything else
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<MonitorError>()
        .map(|e| e.exit_code() as u8)
        .unwrap_or(1)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = CoinsConfig::load(&cli.config)
        .with_context(|| format!("Loading coins config {}", cli.config.display()))?;
    let settings = Settings::from_env()?;

    match cli.command {
        Command::Monitor {
            view: MonitorCommand::Price(args),
        } => run_price(args, &config, &settings).await,
        Command::Monitor {
            view: MonitorCommand::Position(args),
        } => run_position(args, &config, &settings).await,
        Command::Trade {
            action: TradeCommand::OpenTrades(args),
        } => run_open_trades(args, &config, &settings).await,
    }
}

fn notifier_for(requested: bool) -> anyhow::Result<Option<TelegramNotifier>> {
    if !requested {
        return Ok(None);
    }
    let notifier = TelegramNotifier::from_env().context("Telegram notifications requested")?;
    Ok(Some(notifier))
}

async fn run_price(args: PriceArgs, config: &CoinsConfig, settings: &Settings) -> anyhow::Result<()> {
    let notifier = notifier_for(args.telegram || args.telegram_interval.is_some())?;
    let client = BinanceClient::from_settings(settings)?;

    let options = PriceOptions {
        sort: args.sort,
        live: args.live,
        refresh: Duration::from_secs(args.refresh),
        telegram_interval: minutes(args.telegram_interval),
    };
    run_price_monitor(&client, config, &options, notifier.as_ref()).await?;
    Ok(())
}

async fn run_position(args: PositionArgs, config: &CoinsConfig, settings: &Settings) -> anyhow::Result<()> {
    let notifier = notifier_for(args.telegram || args.telegram_interval.is_some())?;
    let mut client = BinanceClient::from_settings(settings)?;
    if !client.has_credentials() {
        return Err(anyhow::Error::new(MonitorError::MissingEnv("BINANCE_API_KEY"))
            .context("Position monitor needs API credentials"));
    }
    if let Err(e) = client.sync_time().await {
        warn!("Clock sync failed, using local time: {}", e);
    }

    let options = PositionOptions {
        sort: args.sort,
        hide_empty: args.hide_empty,
        compact: args.compact,
        wallet_target: settings.wallet_target,
        telegram_interval: minutes(args.telegram_interval),
    };
    run_position_monitor(&client, config, &options, notifier.as_ref()).await?;
    Ok(())
}

async fn run_open_trades(args: OpenTradesArgs, config: &CoinsConfig, settings: &Settings) -> anyhow::Result<()> {
    println!("╔═══════════════════════════════════════════════════════════════╗");
    println!("║              OPEN TRADES PLAN (dry run, no orders)            ║");
    println!("╚═══════════════════════════════════════════════════════════════╝");
    println!();

    let client = BinanceClient::from_settings(settings)?;
    let request = TradeRequest {
        symbols: args.symbols,
        margin_usd: args.usd,
        side: args.side.into(),
    };
    let plan = plan_trades(&client, config, &request).await?;

    display::trade_plan_table(&plan, true).printstd();
    println!();
    println!("   • Margin per trade: {}", display::format_usd(request.margin_usd));
    println!("   • Total margin: {}", display::format_usd(plan.total_margin()));
    println!("   • Total SL risk: {}", display::format_usd(plan.total_sl_risk()));
    for line in display::error_lines(&plan.errors) {
        println!("{}", line);
    }
    println!();
    println!("⚠️  Dry run: no orders were sent");
    Ok(())
}
