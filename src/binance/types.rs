use serde::Deserialize;

/// `GET /fapi/v1/time`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTime {
    pub server_time: i64,
}

/// Error body returned with non-2xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}

/// 24h rolling ticker statistics (`GET /fapi/v1/ticker/24hr`)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24hr {
    pub symbol: String,
    pub last_price: String,
    pub price_change_percent: String,
}

impl Ticker24hr {
    pub fn last_price_f64(&self) -> Option<f64> {
        self.last_price.parse().ok()
    }

    pub fn price_change_percent_f64(&self) -> Option<f64> {
        self.price_change_percent.parse().ok()
    }
}

/// One candle as returned by `GET /fapi/v1/klines`.
///
/// Binance encodes candles as positional arrays:
/// `[openTime, open, high, low, close, volume, closeTime, quoteVolume,
///   trades, takerBuyBase, takerBuyQuote, ignore]`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawKline(
    pub i64,
    pub String,
    pub String,
    pub String,
    pub String,
    pub String,
    pub i64,
    pub String,
    pub u64,
    pub String,
    pub String,
    pub String,
);

impl RawKline {
    pub fn open_time(&self) -> i64 {
        self.0
    }

    pub fn open_f64(&self) -> Option<f64> {
        self.1.parse().ok()
    }
}

/// Futures account balance entry (`GET /fapi/v2/balance`)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuturesBalance {
    pub asset: String,
    pub balance: String,
    #[serde(default)]
    pub cross_un_pnl: Option<String>,
}

impl FuturesBalance {
    pub fn balance_f64(&self) -> f64 {
        self.balance.parse().unwrap_or(0.0)
    }

    pub fn cross_un_pnl_f64(&self) -> f64 {
        self.cross_un_pnl
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0)
    }
}

/// Position risk entry (`GET /fapi/v2/positionRisk`).
///
/// The exchange lists every market, including ones with `positionAmt == 0`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRisk {
    pub symbol: String,
    pub position_amt: String,
    pub entry_price: String,
    pub mark_price: String,
    #[serde(rename = "unRealizedProfit", default)]
    pub unrealized_profit: Option<String>,
    #[serde(default)]
    pub leverage: Option<String>,
}

impl PositionRisk {
    pub fn amount(&self) -> f64 {
        self.position_amt.parse().unwrap_or(0.0)
    }

    pub fn entry(&self) -> f64 {
        self.entry_price.parse().unwrap_or(0.0)
    }

    pub fn mark(&self) -> f64 {
        self.mark_price.parse().unwrap_or(0.0)
    }

    pub fn unrealized_pnl(&self) -> Option<f64> {
        self.unrealized_profit.as_ref().and_then(|s| s.parse().ok())
    }

    pub fn leverage_u32(&self) -> Option<u32> {
        self.leverage
            .as_ref()
            .and_then(|s| s.parse().ok())
            .filter(|lev| *lev > 0)
    }
}

/// Open order (`GET /fapi/v1/openOrders`)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrder {
    #[serde(rename = "type")]
    pub order_type: String,
    #[serde(default)]
    pub reduce_only: bool,
    #[serde(default)]
    pub close_position: bool,
    #[serde(default)]
    pub stop_price: Option<String>,
}

impl OpenOrder {
    /// Protective stop: a STOP / STOP_MARKET order that can only reduce the position
    pub fn is_protective_stop(&self) -> bool {
        matches!(self.order_type.as_str(), "STOP" | "STOP_MARKET")
            && (self.reduce_only || self.close_position)
    }

    pub fn stop_price_f64(&self) -> Option<f64> {
        self.stop_price
            .as_ref()
            .and_then(|s| s.parse().ok())
            .filter(|p: &f64| *p > 0.0)
    }
}

/// `GET /fapi/v1/exchangeInfo` (only the parts we read)
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    #[serde(default)]
    pub filters: Vec<serde_json::Value>,
}

impl SymbolInfo {
    /// `stepSize` of the LOT_SIZE filter
    pub fn lot_size(&self) -> Option<f64> {
        self.filters
            .iter()
            .find(|f| f.get("filterType").and_then(|t| t.as_str()) == Some("LOT_SIZE"))
            .and_then(|f| f.get("stepSize"))
            .and_then(|s| s.as_str())
            .and_then(|s| s.parse().ok())
            .filter(|step: &f64| *step > 0.0)
    }
}
