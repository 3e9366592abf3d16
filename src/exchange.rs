/// Exchange abstraction used by the monitors.
///
/// The Binance REST client implements it for real runs; tests plug in an
/// in-memory implementation.
use crate::error::Result;
use crate::position::PositionSnapshot;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

/// Latest price and 24h change for one symbol
#[derive(Debug, Clone, PartialEq)]
pub struct TickerStats {
    pub symbol: String,
    pub last_price: f64,
    pub change_24h_pct: f64,
}

/// Candle reduced to what the price monitor reads
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kline {
    pub open_time: DateTime<Utc>,
    pub open: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KlineInterval {
    OneMinute,
    FifteenMinutes,
    OneHour,
}

impl KlineInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            KlineInterval::OneMinute => "1m",
            KlineInterval::FifteenMinutes => "15m",
            KlineInterval::OneHour => "1h",
        }
    }
}

impl fmt::Display for KlineInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// USDT futures wallet
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WalletBalance {
    pub balance: f64,
    pub unrealized_pnl: f64,
}

#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// 24h ticker statistics for every listed symbol
    async fn tickers_24h(&self) -> Result<Vec<TickerStats>>;

    /// Candles for `symbol` opening at or after `start`, oldest first
    async fn klines(
        &self,
        symbol: &str,
        interval: KlineInterval,
        start: DateTime<Utc>,
        limit: Option<u32>,
    ) -> Result<Vec<Kline>>;

    async fn wallet_balance(&self) -> Result<WalletBalance>;

    /// Every position entry reported by the exchange, zero-size ones included
    async fn positions(&self) -> Result<Vec<PositionSnapshot>>;

    /// Trigger price of the protective stop order on `symbol`, if one is open
    async fn stop_order_price(&self, symbol: &str) -> Result<Option<f64>>;

    /// Quantity step for `symbol`
    async fn lot_size(&self, symbol: &str) -> Result<Option<f64>>;
}
