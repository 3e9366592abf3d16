/// Price and position monitor passes, and the interval loops around them
use crate::config::CoinsConfig;
use crate::display;
use crate::error::Result;
use crate::exchange::ExchangeApi;
use crate::position::{build_rows, evaluate_positions, PositionRow, PositionSortKey, WalletSummary};
use crate::price::{collect_price_report, PriceReport, PriceSortKey};
use crate::sort::{SortDirection, SortSpec};
use crate::telegram::{self, TelegramNotifier};
use chrono::Utc;
use prettytable::Table;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

pub const DEFAULT_REFRESH_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct PriceOptions {
    pub sort: SortSpec<PriceSortKey>,
    /// redraw every `refresh` until Ctrl-C
    pub live: bool,
    pub refresh: Duration,
    /// repeat pass + send on this period
    pub telegram_interval: Option<Duration>,
}

impl Default for PriceOptions {
    fn default() -> Self {
        Self {
            sort: SortSpec {
                key: PriceSortKey::Default,
                direction: SortDirection::Descending,
            },
            live: false,
            refresh: Duration::from_secs(DEFAULT_REFRESH_SECS),
            telegram_interval: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PositionOptions {
    pub sort: SortSpec<PositionSortKey>,
    pub hide_empty: bool,
    /// wallet summary only
    pub compact: bool,
    /// 0 disables the progress bar
    pub wallet_target: f64,
    pub telegram_interval: Option<Duration>,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            sort: SortSpec {
                key: PositionSortKey::Default,
                direction: SortDirection::Descending,
            },
            hide_empty: false,
            compact: false,
            wallet_target: 0.0,
            telegram_interval: None,
        }
    }
}

/// Decides when a pass should also send to Telegram.
///
/// The first pass always sends. Later passes send once `interval` has
/// elapsed since the last send; without an interval only the first does.
#[derive(Debug, Clone)]
pub struct TelegramSchedule {
    interval: Option<Duration>,
    last_sent: Option<Instant>,
}

impl TelegramSchedule {
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match (self.last_sent, self.interval) {
            (None, _) => true,
            (Some(last), Some(interval)) => now.duration_since(last) >= interval,
            (Some(_), None) => false,
        }
    }

    pub fn mark_sent(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }
}

/// Telegram notifier plus its send schedule
pub struct TelegramOutput<'a> {
    notifier: &'a TelegramNotifier,
    schedule: TelegramSchedule,
}

impl<'a> TelegramOutput<'a> {
    pub fn new(notifier: &'a TelegramNotifier, interval: Option<Duration>) -> Self {
        Self {
            notifier,
            schedule: TelegramSchedule::new(interval),
        }
    }

    /// Send when due. A failed send still counts as the attempt for this period.
    async fn send_if_due(&mut self, message: impl FnOnce() -> String) -> Result<()> {
        let now = Instant::now();
        if !self.schedule.is_due(now) {
            return Ok(());
        }
        self.schedule.mark_sent(now);
        self.notifier.send(&message()).await
    }
}

/// Everything the position view renders
#[derive(Debug, Clone)]
pub struct PositionView {
    pub summary: WalletSummary,
    pub rows: Vec<PositionRow>,
}

/// Fetch balance, positions and stop orders and compute the position view.
///
/// The wallet summary covers every open position even when `hide_empty`
/// drops rows from the table.
pub async fn collect_position_view(
    exchange: &dyn ExchangeApi,
    config: &CoinsConfig,
    hide_empty: bool,
) -> Result<PositionView> {
    let wallet = exchange.wallet_balance().await?;
    let positions = exchange.positions().await?;
    let mut open = evaluate_positions(&positions, config)?;
    info!("{} open positions", open.len());

    for position in &mut open {
        match exchange.stop_order_price(&position.snapshot.symbol).await {
            Ok(price) => position.stop_order_price = price,
            Err(e) => warn!("{} stop order lookup failed: {}", position.snapshot.symbol, e),
        }
    }

    Ok(PositionView {
        summary: WalletSummary::compute(wallet, &open),
        rows: build_rows(&open, config, hide_empty),
    })
}

/// One price pass: fetch, sort, print, and optionally notify
pub async fn price_pass(
    exchange: &dyn ExchangeApi,
    config: &CoinsConfig,
    options: &PriceOptions,
    notify: Option<&mut TelegramOutput<'_>>,
) -> Result<PriceReport> {
    let mut report = collect_price_report(exchange, &config.symbols(), Utc::now()).await?;
    options.sort.apply(&mut report.rows);

    if options.live {
        display::clear_screen();
        println!("🕒 Updated: {} UTC", Utc::now().format("%Y-%m-%d %H:%M:%S"));
    }
    display::price_table(&report.rows, true).printstd();
    if let Some(footer) = options.sort.describe() {
        println!("\n{}", footer);
    }
    for line in display::error_lines(&report.errors) {
        println!("{}", line);
    }

    if let Some(output) = notify {
        output.send_if_due(|| telegram::price_message(&report.rows)).await?;
    }
    Ok(report)
}

/// Wallet lines and progress bar, plus the table unless compact
pub fn position_screen(view: &PositionView, options: &PositionOptions, colored: bool) -> (Vec<String>, Option<Table>) {
    let mut lines = display::wallet_summary_lines(&view.summary, colored);
    if let Some(bar) = display::progress_bar(view.summary.total_with_unrealized, options.wallet_target, colored) {
        lines.push(bar);
    }
    let table = (!options.compact).then(|| display::position_table(&view.rows, view.summary.wallet_balance, colored));
    (lines, table)
}

/// One position pass: fetch, compute, sort, print, and optionally notify
pub async fn position_pass(
    exchange: &dyn ExchangeApi,
    config: &CoinsConfig,
    options: &PositionOptions,
    notify: Option<&mut TelegramOutput<'_>>,
) -> Result<PositionView> {
    let mut view = collect_position_view(exchange, config, options.hide_empty).await?;
    options.sort.apply(&mut view.rows);

    let (lines, table) = position_screen(&view, options, true);
    println!();
    for line in lines {
        println!("{}", line);
    }
    if let Some(table) = table {
        println!();
        table.printstd();
        if let Some(footer) = options.sort.describe() {
            println!("\n{}", footer);
        }
    }

    if let Some(output) = notify {
        output
            .send_if_due(|| telegram::position_message(&view.summary, &view.rows))
            .await?;
    }
    Ok(view)
}

/// Run the price view once, live, or on the Telegram interval
pub async fn run_price_monitor(
    exchange: &dyn ExchangeApi,
    config: &CoinsConfig,
    options: &PriceOptions,
    notifier: Option<&TelegramNotifier>,
) -> Result<()> {
    let mut telegram = notifier.map(|n| TelegramOutput::new(n, options.telegram_interval));

    let period = match (options.live, options.telegram_interval) {
        (true, _) => options.refresh,
        (false, Some(interval)) => interval,
        (false, None) => {
            price_pass(exchange, config, options, telegram.as_mut()).await?;
            return Ok(());
        }
    };

    info!("Price monitor running every {:?}", period);
    let mut ticker = tick_timer(period);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                say_goodbye();
                return Ok(());
            }
            _ = ticker.tick() => {
                let result = price_pass(exchange, config, options, telegram.as_mut()).await;
                keep_running(result.map(|_| ()))?;
            }
        }
    }
}

/// Run the position view once, or on the Telegram interval
pub async fn run_position_monitor(
    exchange: &dyn ExchangeApi,
    config: &CoinsConfig,
    options: &PositionOptions,
    notifier: Option<&TelegramNotifier>,
) -> Result<()> {
    let mut telegram = notifier.map(|n| TelegramOutput::new(n, options.telegram_interval));

    let Some(period) = options.telegram_interval else {
        position_pass(exchange, config, options, telegram.as_mut()).await?;
        return Ok(());
    };

    info!("Position monitor running every {:?}", period);
    let mut ticker = tick_timer(period);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                say_goodbye();
                return Ok(());
            }
            _ = ticker.tick() => {
                let result = position_pass(exchange, config, options, telegram.as_mut()).await;
                keep_running(result.map(|_| ()))?;
            }
        }
    }
}

fn tick_timer(period: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Configuration errors stop a loop; anything else is logged once and
/// waits for the next tick
fn keep_running(result: Result<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_config_error() => Err(e),
        Err(e) => {
            warn!("⚠️ Pass failed, retrying on next tick: {}", e);
            Ok(())
        }
    }
}

fn say_goodbye() {
    println!("\n👋 Exiting gracefully. Goodbye!");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MonitorError;
    use crate::position::{compute_risk, OpenPosition, PositionSide, PositionSnapshot};

    #[test]
    fn test_schedule_first_pass_is_due() {
        let schedule = TelegramSchedule::new(Some(Duration::from_secs(600)));
        assert!(schedule.is_due(Instant::now()));
    }

    #[test]
    fn test_schedule_waits_for_interval() {
        let mut schedule = TelegramSchedule::new(Some(Duration::from_secs(600)));
        let start = Instant::now();
        schedule.mark_sent(start);

        assert!(!schedule.is_due(start + Duration::from_secs(5)));
        assert!(!schedule.is_due(start + Duration::from_secs(599)));
        assert!(schedule.is_due(start + Duration::from_secs(600)));
    }

    #[test]
    fn test_schedule_without_interval_sends_once() {
        let mut schedule = TelegramSchedule::new(None);
        let start = Instant::now();
        assert!(schedule.is_due(start));
        schedule.mark_sent(start);
        assert!(!schedule.is_due(start + Duration::from_secs(3600)));
    }

    #[test]
    fn test_keep_running_stops_on_config_errors_only() {
        assert!(keep_running(Ok(())).is_ok());
        assert!(keep_running(Err(MonitorError::Notify("timeout".to_string()))).is_ok());
        assert!(keep_running(Err(MonitorError::Api {
            status: 502,
            code: 0,
            msg: "bad gateway".to_string(),
        }))
        .is_ok());

        let err = keep_running(Err(MonitorError::MissingSymbolConfig("XRPUSDT".to_string()))).unwrap_err();
        assert!(err.is_config_error());
    }

    fn sample_view() -> PositionView {
        let snapshot = PositionSnapshot {
            symbol: "BTCUSDT".to_string(),
            amount: 0.01,
            entry_price: 100000.0,
            mark_price: 101000.0,
            leverage: Some(25),
            unrealized_pnl: Some(10.0),
        };
        let metrics = compute_risk(&snapshot, PositionSide::Long, 25, 2.0);
        PositionView {
            summary: WalletSummary {
                wallet_balance: 1000.0,
                total_with_unrealized: 1010.0,
                ..WalletSummary::default()
            },
            rows: vec![PositionRow::Open(OpenPosition {
                snapshot,
                side: PositionSide::Long,
                metrics,
                stop_order_price: None,
            })],
        }
    }

    #[test]
    fn test_compact_screen_has_no_table() {
        let view = sample_view();
        let options = PositionOptions {
            compact: true,
            wallet_target: 2000.0,
            ..PositionOptions::default()
        };

        let (lines, table) = position_screen(&view, &options, false);
        assert!(table.is_none());
        assert!(lines.iter().any(|l| l.contains("$1,000.00")));
        assert_eq!(lines.len(), display::wallet_summary_lines(&view.summary, false).len() + 1);
    }

    #[test]
    fn test_full_screen_includes_position_table() {
        let view = sample_view();
        let (lines, table) = position_screen(&view, &PositionOptions::default(), false);

        // no target, no progress bar
        assert_eq!(lines, display::wallet_summary_lines(&view.summary, false));
        let table = table.unwrap();
        assert!(table.to_string().contains("BTCUSDT"));
    }
}
