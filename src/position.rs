/// Position risk / PnL computation and wallet aggregates
use crate::config::CoinsConfig;
use crate::error::{MonitorError, Result};
use crate::exchange::WalletBalance;
use crate::sort::{SortKey, SortValue};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "LONG",
            PositionSide::Short => "SHORT",
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position as reported by the exchange
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSnapshot {
    pub symbol: String,
    /// signed, in base-asset units; negative is short
    pub amount: f64,
    pub entry_price: f64,
    pub mark_price: f64,
    /// exchange-reported leverage, when available
    pub leverage: Option<u32>,
    /// exchange-reported unrealized PnL, when available
    pub unrealized_pnl: Option<f64>,
}

impl PositionSnapshot {
    pub fn is_open(&self) -> bool {
        self.amount != 0.0
    }

    pub fn side(&self) -> Option<PositionSide> {
        if self.amount > 0.0 {
            Some(PositionSide::Long)
        } else if self.amount < 0.0 {
            Some(PositionSide::Short)
        } else {
            None
        }
    }

    /// |amount| × mark
    pub fn notional(&self) -> f64 {
        self.amount.abs() * self.mark_price
    }

    /// Exchange figure, or `(mark − entry) × amount` when it was not reported
    pub fn pnl(&self) -> f64 {
        self.unrealized_pnl
            .unwrap_or((self.mark_price - self.entry_price) * self.amount)
    }
}

/// Derived risk figures for one open position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskMetrics {
    pub leverage: u32,
    pub notional: f64,
    pub used_margin: f64,
    pub unrealized_pnl: f64,
    /// PnL relative to used margin; `None` when margin is zero
    pub pnl_percent: Option<f64>,
    pub stop_loss_price: f64,
    /// `(stop − mark) / mark × 100`; `None` when mark is zero
    pub percent_to_stop: Option<f64>,
    pub sl_usd_at_risk: f64,
}

pub fn stop_loss_price(entry_price: f64, side: PositionSide, stop_loss_percent: f64) -> f64 {
    match side {
        PositionSide::Long => entry_price * (1.0 - stop_loss_percent / 100.0),
        PositionSide::Short => entry_price * (1.0 + stop_loss_percent / 100.0),
    }
}

/// Risk metrics for `position` at the given leverage and stop-loss percent
pub fn compute_risk(
    position: &PositionSnapshot,
    side: PositionSide,
    leverage: u32,
    stop_loss_percent: f64,
) -> RiskMetrics {
    let notional = position.notional();
    let used_margin = if leverage > 0 { notional / f64::from(leverage) } else { 0.0 };
    let unrealized_pnl = position.pnl();
    let pnl_percent = (used_margin > 0.0).then(|| unrealized_pnl / used_margin * 100.0);
    let stop = stop_loss_price(position.entry_price, side, stop_loss_percent);
    let percent_to_stop = (position.mark_price > 0.0)
        .then(|| (stop - position.mark_price) / position.mark_price * 100.0);

    RiskMetrics {
        leverage,
        notional,
        used_margin,
        unrealized_pnl,
        pnl_percent,
        stop_loss_price: stop,
        percent_to_stop,
        sl_usd_at_risk: notional * stop_loss_percent / 100.0,
    }
}

/// An open position with its computed metrics
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub snapshot: PositionSnapshot,
    pub side: PositionSide,
    pub metrics: RiskMetrics,
    /// trigger price of a live protective stop order, if any
    pub stop_order_price: Option<f64>,
}

impl OpenPosition {
    /// Used margin as a share of the wallet balance
    pub fn margin_share_pct(&self, wallet_balance: f64) -> Option<f64> {
        (wallet_balance > 0.0).then(|| self.metrics.used_margin / wallet_balance * 100.0)
    }
}

/// Compute metrics for every open position.
///
/// Zero-size entries are dropped. An open position on a symbol missing from
/// the coins config is a configuration error.
pub fn evaluate_positions(positions: &[PositionSnapshot], config: &CoinsConfig) -> Result<Vec<OpenPosition>> {
    let mut open = Vec::new();
    for position in positions {
        let Some(side) = position.side() else {
            continue;
        };
        let coin = config
            .get(&position.symbol)
            .ok_or_else(|| MonitorError::MissingSymbolConfig(position.symbol.clone()))?;
        let leverage = position.leverage.unwrap_or(coin.leverage);

        open.push(OpenPosition {
            snapshot: position.clone(),
            side,
            metrics: compute_risk(position, side, leverage, coin.stop_loss_percent),
            stop_order_price: None,
        });
    }
    Ok(open)
}

/// One row of the position table
#[derive(Debug, Clone, PartialEq)]
pub enum PositionRow {
    Open(OpenPosition),
    /// configured symbol with no open position
    Empty { symbol: String, leverage: u32 },
}

impl PositionRow {
    pub fn symbol(&self) -> &str {
        match self {
            PositionRow::Open(p) => &p.snapshot.symbol,
            PositionRow::Empty { symbol, .. } => symbol,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PositionRow::Empty { .. })
    }
}

/// Rows in coins config order: open positions, then (unless `hide_empty`)
/// one empty row per configured symbol without a position.
pub fn build_rows(open: &[OpenPosition], config: &CoinsConfig, hide_empty: bool) -> Vec<PositionRow> {
    let mut rows: Vec<PositionRow> = open.iter().cloned().map(PositionRow::Open).collect();
    rows.sort_by_key(|row| config.index_of(row.symbol()).unwrap_or(usize::MAX));

    if !hide_empty {
        for coin in config.iter() {
            if !open.iter().any(|p| p.snapshot.symbol == coin.symbol) {
                rows.push(PositionRow::Empty {
                    symbol: coin.symbol.clone(),
                    leverage: coin.leverage,
                });
            }
        }
    }
    rows
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSortKey {
    Default,
    PnlPct,
    SlUsd,
}

impl SortKey for PositionSortKey {
    const NAMES: &'static [&'static str] = &["default", "pnl_pct", "sl_usd"];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "default" => Some(PositionSortKey::Default),
            "pnl_pct" => Some(PositionSortKey::PnlPct),
            "sl_usd" => Some(PositionSortKey::SlUsd),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            PositionSortKey::Default => "default",
            PositionSortKey::PnlPct => "pnl_pct",
            PositionSortKey::SlUsd => "sl_usd",
        }
    }

    fn is_default(&self) -> bool {
        *self == PositionSortKey::Default
    }
}

impl SortValue<PositionSortKey> for PositionRow {
    fn sort_value(&self, key: PositionSortKey) -> Option<f64> {
        let PositionRow::Open(position) = self else {
            return None;
        };
        match key {
            PositionSortKey::Default => None,
            PositionSortKey::PnlPct => position.metrics.pnl_percent,
            PositionSortKey::SlUsd => Some(position.metrics.sl_usd_at_risk),
        }
    }
}

/// Account-level figures shown above the position table
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WalletSummary {
    pub wallet_balance: f64,
    pub unrealized_pnl: f64,
    /// unrealized PnL relative to wallet balance; `None` for an empty wallet
    pub unrealized_pct: Option<f64>,
    pub total_with_unrealized: f64,
    pub used_margin: f64,
    pub available_balance: f64,
    pub total_sl_risk: f64,
    pub sl_risk_pct: Option<f64>,
}

impl WalletSummary {
    /// Aggregate over every open position, independent of table filtering
    pub fn compute(wallet: WalletBalance, open: &[OpenPosition]) -> Self {
        let used_margin: f64 = open.iter().map(|p| p.metrics.used_margin).sum();
        let total_sl_risk: f64 = open.iter().map(|p| p.metrics.sl_usd_at_risk).sum();
        let total_with_unrealized = wallet.balance + wallet.unrealized_pnl;
        let share = |value: f64| (wallet.balance > 0.0).then(|| value / wallet.balance * 100.0);

        Self {
            wallet_balance: wallet.balance,
            unrealized_pnl: wallet.unrealized_pnl,
            unrealized_pct: share(wallet.unrealized_pnl),
            total_with_unrealized,
            used_margin,
            available_balance: total_with_unrealized - used_margin,
            total_sl_risk,
            sl_risk_pct: share(total_sl_risk),
        }
    }
}
