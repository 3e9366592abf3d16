pub mod binance;
pub mod config;
pub mod display;
pub mod error;
pub mod exchange;
pub mod monitor;
pub mod position;
pub mod price;
pub mod sort;
pub mod telegram;
pub mod trade;

// Re-export commonly used types
pub use binance::BinanceClient;
pub use config::{BinanceCredentials, CoinConfig, CoinsConfig, Settings, DEFAULT_CONFIG_PATH};
pub use error::{MonitorError, Result};
pub use exchange::{ExchangeApi, Kline, KlineInterval, TickerStats, WalletBalance};
pub use telegram::TelegramNotifier;

// Re-export monitor types
pub use monitor::{
    collect_position_view, run_position_monitor, run_price_monitor, PositionOptions, PositionView,
    PriceOptions, TelegramSchedule,
};
pub use position::{
    compute_risk, evaluate_positions, OpenPosition, PositionRow, PositionSide, PositionSnapshot,
    PositionSortKey, RiskMetrics, WalletSummary,
};
pub use price::{collect_price_report, pct_change, session_open_anchor, PriceReport, PriceRow, PriceSortKey};
pub use sort::{SortDirection, SortSpec};
pub use trade::{calculate_quantity, plan_trades, PlannedOrder, TradePlan, TradeRequest};

use tracing_subscriber::EnvFilter;

/// Initialize logging for the library.
///
/// Logs go to stderr so tables on stdout stay clean. `RUST_LOG` overrides
/// the default `warn` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();
}
