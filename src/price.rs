/// Price change computation for the price monitor
use crate::error::Result;
use crate::exchange::{ExchangeApi, KlineInterval};
use crate::sort::{SortKey, SortValue};
use chrono::{DateTime, TimeDelta, Timelike, Utc};
use std::collections::HashMap;
use tracing::{info, warn};

/// Session open is 08:00 at UTC+8 ("Asia 8AM")
pub const SESSION_OPEN_HOUR: i64 = 8;
pub const SESSION_UTC_OFFSET_HOURS: i64 = 8;

const SECONDS_PER_DAY: i64 = 86_400;

/// Percent change from `reference` to `current`.
///
/// `None` when the reference is zero, negative or not finite.
pub fn pct_change(current: f64, reference: f64) -> Option<f64> {
    if !reference.is_finite() || !current.is_finite() || reference <= 0.0 {
        return None;
    }
    Some((current - reference) / reference * 100.0)
}

/// Most recent session open (08:00 UTC+8) at or before `now`, in UTC
pub fn session_open_anchor(now: DateTime<Utc>) -> DateTime<Utc> {
    let local = now + TimeDelta::hours(SESSION_UTC_OFFSET_HOURS);
    let since_midnight = i64::from(local.num_seconds_from_midnight());
    let mut since_open = since_midnight - SESSION_OPEN_HOUR * 3600;
    if since_open < 0 {
        since_open += SECONDS_PER_DAY;
    }
    now - TimeDelta::seconds(since_open) - TimeDelta::nanoseconds(i64::from(local.nanosecond()))
}

/// Current price plus reference prices for each window
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSnapshot {
    pub symbol: String,
    pub last_price: f64,
    pub ref_15m: Option<f64>,
    pub ref_1h: Option<f64>,
    pub ref_session_open: Option<f64>,
    /// exchange-reported, passed through unchanged
    pub change_24h_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceChanges {
    pub change_15m: Option<f64>,
    pub change_1h: Option<f64>,
    pub change_session: Option<f64>,
    pub change_24h: f64,
}

impl PriceSnapshot {
    pub fn changes(&self) -> PriceChanges {
        let delta = |reference: Option<f64>| reference.and_then(|r| pct_change(self.last_price, r));
        PriceChanges {
            change_15m: delta(self.ref_15m),
            change_1h: delta(self.ref_1h),
            change_session: delta(self.ref_session_open),
            change_24h: self.change_24h_pct,
        }
    }
}

/// One row of the price table
#[derive(Debug, Clone, PartialEq)]
pub enum PriceRow {
    Quote {
        symbol: String,
        last_price: f64,
        changes: PriceChanges,
    },
    Error {
        symbol: String,
        reason: String,
    },
}

impl PriceRow {
    pub fn symbol(&self) -> &str {
        match self {
            PriceRow::Quote { symbol, .. } | PriceRow::Error { symbol, .. } => symbol,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSortKey {
    Default,
    Change15m,
    Change1h,
    ChangeAsia,
    Change24h,
}

impl SortKey for PriceSortKey {
    const NAMES: &'static [&'static str] = &["default", "change_15m", "change_1h", "change_asia", "change_24h"];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "default" => Some(PriceSortKey::Default),
            "change_15m" => Some(PriceSortKey::Change15m),
            "change_1h" => Some(PriceSortKey::Change1h),
            "change_asia" => Some(PriceSortKey::ChangeAsia),
            "change_24h" => Some(PriceSortKey::Change24h),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            PriceSortKey::Default => "default",
            PriceSortKey::Change15m => "change_15m",
            PriceSortKey::Change1h => "change_1h",
            PriceSortKey::ChangeAsia => "change_asia",
            PriceSortKey::Change24h => "change_24h",
        }
    }

    fn is_default(&self) -> bool {
        *self == PriceSortKey::Default
    }
}

impl SortValue<PriceSortKey> for PriceRow {
    fn sort_value(&self, key: PriceSortKey) -> Option<f64> {
        let PriceRow::Quote { changes, .. } = self else {
            return None;
        };
        match key {
            PriceSortKey::Default => None,
            PriceSortKey::Change15m => changes.change_15m,
            PriceSortKey::Change1h => changes.change_1h,
            PriceSortKey::ChangeAsia => changes.change_session,
            PriceSortKey::Change24h => Some(changes.change_24h),
        }
    }
}

/// Rows in coins config order plus per-symbol problems
#[derive(Debug, Clone, Default)]
pub struct PriceReport {
    pub rows: Vec<PriceRow>,
    pub errors: Vec<(String, String)>,
}

/// Fetch tickers and reference klines for `symbols` and build the price rows.
///
/// A failed ticker call aborts the pass. A failed kline lookup only blanks
/// that one window.
pub async fn collect_price_report(
    exchange: &dyn ExchangeApi,
    symbols: &[String],
    now: DateTime<Utc>,
) -> Result<PriceReport> {
    info!("Fetching prices for {} symbols", symbols.len());
    let tickers: HashMap<String, _> = exchange
        .tickers_24h()
        .await?
        .into_iter()
        .map(|t| (t.symbol.clone(), t))
        .collect();

    let anchor = session_open_anchor(now);
    let mut report = PriceReport::default();

    for symbol in symbols {
        let Some(ticker) = tickers.get(symbol) else {
            report.errors.push((symbol.clone(), "ticker not found".to_string()));
            report.rows.push(PriceRow::Error {
                symbol: symbol.clone(),
                reason: "ticker not found".to_string(),
            });
            continue;
        };

        let snapshot = PriceSnapshot {
            symbol: symbol.clone(),
            last_price: ticker.last_price,
            ref_15m: latest_open(exchange, symbol, KlineInterval::FifteenMinutes, now - TimeDelta::minutes(15)).await,
            ref_1h: latest_open(exchange, symbol, KlineInterval::OneHour, now - TimeDelta::minutes(60)).await,
            ref_session_open: anchor_open(exchange, symbol, anchor).await,
            change_24h_pct: ticker.change_24h_pct,
        };

        report.rows.push(PriceRow::Quote {
            symbol: symbol.clone(),
            last_price: snapshot.last_price,
            changes: snapshot.changes(),
        });
    }

    Ok(report)
}

/// Open of the newest candle starting after `start`
async fn latest_open(
    exchange: &dyn ExchangeApi,
    symbol: &str,
    interval: KlineInterval,
    start: DateTime<Utc>,
) -> Option<f64> {
    match exchange.klines(symbol, interval, start, None).await {
        Ok(klines) => klines.last().map(|k| k.open),
        Err(e) => {
            warn!("{} {} kline unavailable: {}", symbol, interval, e);
            None
        }
    }
}

/// Open of the first one-minute candle at the session anchor
async fn anchor_open(exchange: &dyn ExchangeApi, symbol: &str, anchor: DateTime<Utc>) -> Option<f64> {
    match exchange.klines(symbol, KlineInterval::OneMinute, anchor, Some(1)).await {
        Ok(klines) => klines.first().map(|k| k.open),
        Err(e) => {
            warn!("{} session open unavailable: {}", symbol, e);
            None
        }
    }
}
