/// Dry-run planner for opening one trade per configured symbol.
///
/// Sizes each order from a fixed margin, the configured leverage and the
/// symbol's lot size. Nothing is sent to the exchange.
use crate::config::CoinsConfig;
use crate::error::{MonitorError, Result};
use crate::exchange::ExchangeApi;
use crate::position::{stop_loss_price, PositionSide};
use std::collections::HashMap;
use tracing::{info, warn};

pub const DEFAULT_MARGIN_USD: f64 = 100.0;

// absorbs float noise so exact multiples of the lot are not rounded down
const LOT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRequest {
    /// symbols to plan; empty means every configured symbol
    pub symbols: Vec<String>,
    /// margin committed per trade, in USD
    pub margin_usd: f64,
    pub side: PositionSide,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedOrder {
    pub symbol: String,
    pub side: PositionSide,
    pub leverage: u32,
    pub price: f64,
    pub lot_size: f64,
    pub quantity: f64,
    pub notional: f64,
    pub stop_loss_price: f64,
    pub sl_usd_at_risk: f64,
}

impl PlannedOrder {
    /// False when the quantity rounded down to zero lots
    pub fn is_executable(&self) -> bool {
        self.quantity > 0.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct TradePlan {
    pub orders: Vec<PlannedOrder>,
    pub errors: Vec<(String, String)>,
}

impl TradePlan {
    pub fn total_margin(&self) -> f64 {
        self.orders
            .iter()
            .filter(|o| o.is_executable())
            .map(|o| o.notional / f64::from(o.leverage))
            .sum()
    }

    pub fn total_sl_risk(&self) -> f64 {
        self.orders
            .iter()
            .filter(|o| o.is_executable())
            .map(|o| o.sl_usd_at_risk)
            .sum()
    }
}

/// Order quantity for `margin_usd` at `leverage`, rounded down to `lot_size`
pub fn calculate_quantity(margin_usd: f64, leverage: u32, price: f64, lot_size: f64) -> f64 {
    if price <= 0.0 || lot_size <= 0.0 {
        return 0.0;
    }
    let base_size = margin_usd * f64::from(leverage) / price;
    (base_size / lot_size + LOT_EPSILON).floor() * lot_size
}

/// Build the dry-run plan for `request`.
///
/// Unknown symbols are a configuration error. A symbol without a ticker or
/// lot size is listed in `errors` and skipped.
pub async fn plan_trades(
    exchange: &dyn ExchangeApi,
    config: &CoinsConfig,
    request: &TradeRequest,
) -> Result<TradePlan> {
    let symbols: Vec<String> = if request.symbols.is_empty() {
        config.symbols()
    } else {
        request.symbols.iter().map(|s| s.to_uppercase()).collect()
    };

    let coins = symbols
        .iter()
        .map(|symbol| {
            config
                .get(symbol)
                .ok_or_else(|| MonitorError::MissingSymbolConfig(symbol.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    info!("Planning {} {} trades with ${} margin each", coins.len(), request.side, request.margin_usd);
    let prices: HashMap<String, f64> = exchange
        .tickers_24h()
        .await?
        .into_iter()
        .map(|t| (t.symbol, t.last_price))
        .collect();

    let mut plan = TradePlan::default();
    for coin in coins {
        let Some(&price) = prices.get(&coin.symbol) else {
            plan.errors.push((coin.symbol.clone(), "ticker not found".to_string()));
            continue;
        };
        let lot_size = match exchange.lot_size(&coin.symbol).await {
            Ok(Some(lot)) => lot,
            Ok(None) => {
                plan.errors.push((coin.symbol.clone(), "lot size not found".to_string()));
                continue;
            }
            Err(e) => {
                warn!("{} lot size unavailable: {}", coin.symbol, e);
                plan.errors.push((coin.symbol.clone(), e.to_string()));
                continue;
            }
        };

        let quantity = calculate_quantity(request.margin_usd, coin.leverage, price, lot_size);
        let notional = quantity * price;
        plan.orders.push(PlannedOrder {
            symbol: coin.symbol.clone(),
            side: request.side,
            leverage: coin.leverage,
            price,
            lot_size,
            quantity,
            notional,
            stop_loss_price: stop_loss_price(price, request.side, coin.stop_loss_percent),
            sl_usd_at_risk: notional * coin.stop_loss_percent / 100.0,
        });
    }

    Ok(plan)
}
