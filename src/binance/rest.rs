use crate::config::{BinanceCredentials, Settings};
use crate::error::{MonitorError, Result};
use crate::exchange::{ExchangeApi, Kline, KlineInterval, TickerStats, WalletBalance};
use crate::position::PositionSnapshot;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::types::{
    ApiErrorBody, ExchangeInfo, FuturesBalance, OpenOrder, PositionRisk, RawKline, ServerTime,
    Ticker24hr,
};

type HmacSha256 = Hmac<Sha256>;

const MAINNET_URL: &str = "https://fapi.binance.com";
const RECV_WINDOW_MS: u64 = 5000;
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Read-only REST client for Binance USDⓈ-M futures
pub struct BinanceClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<BinanceCredentials>,
    /// server time minus local time, applied to signed request timestamps
    time_offset_ms: i64,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>, credentials: Option<BinanceCredentials>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            time_offset_ms: 0,
        })
    }

    pub fn new_mainnet(credentials: Option<BinanceCredentials>) -> Result<Self> {
        Self::new(MAINNET_URL, credentials)
    }

    /// Mainnet unless `BINANCE_BASE_URL` overrides it
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let credentials = settings.credentials.clone();
        match &settings.base_url {
            Some(url) => Self::new(url.clone(), credentials),
            None => Self::new_mainnet(credentials),
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn time_offset_ms(&self) -> i64 {
        self.time_offset_ms
    }

    /// Align signed request timestamps with the exchange clock.
    ///
    /// Returns the new offset in milliseconds.
    pub async fn sync_time(&mut self) -> Result<i64> {
        let server: ServerTime = self.get_public("/fapi/v1/time", &[]).await?;
        let local = Utc::now().timestamp_millis();
        self.time_offset_ms = server.server_time - local;
        info!("Synced exchange clock (offset {} ms)", self.time_offset_ms);
        Ok(self.time_offset_ms)
    }

    async fn get_public<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let query = encode_query(params);
        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };
        debug!("GET {}", url);

        let response = self.http.get(&url).send().await?;
        decode_response(response).await
    }

    async fn get_signed<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(MonitorError::MissingEnv("BINANCE_API_KEY"))?;

        let timestamp = Utc::now().timestamp_millis() + self.time_offset_ms;
        let mut all_params: Vec<(&str, String)> = params.to_vec();
        all_params.push(("recvWindow", RECV_WINDOW_MS.to_string()));
        all_params.push(("timestamp", timestamp.to_string()));

        let query = encode_query(&all_params);
        let signature = sign_query(&credentials.api_secret, &query)?;
        let url = format!("{}{}?{}&signature={}", self.base_url, path, query, signature);
        debug!("GET {}{} (signed)", self.base_url, path);

        let response = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &credentials.api_key)
            .send()
            .await?;
        decode_response(response).await
    }

    pub async fn get_tickers(&self) -> Result<Vec<Ticker24hr>> {
        self.get_public("/fapi/v1/ticker/24hr", &[]).await
    }

    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: KlineInterval,
        start_time_ms: i64,
        limit: Option<u32>,
    ) -> Result<Vec<RawKline>> {
        let mut params = vec![
            ("symbol", symbol.to_string()),
            ("interval", interval.as_str().to_string()),
            ("startTime", start_time_ms.to_string()),
        ];
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        self.get_public("/fapi/v1/klines", &params).await
    }

    pub async fn get_balances(&self) -> Result<Vec<FuturesBalance>> {
        self.get_signed("/fapi/v2/balance", &[]).await
    }

    pub async fn get_position_risk(&self) -> Result<Vec<PositionRisk>> {
        self.get_signed("/fapi/v2/positionRisk", &[]).await
    }

    pub async fn get_open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>> {
        self.get_signed("/fapi/v1/openOrders", &[("symbol", symbol.to_string())])
            .await
    }

    pub async fn get_exchange_info(&self) -> Result<ExchangeInfo> {
        self.get_public("/fapi/v1/exchangeInfo", &[]).await
    }
}

#[async_trait]
impl ExchangeApi for BinanceClient {
    async fn tickers_24h(&self) -> Result<Vec<TickerStats>> {
        let tickers = self.get_tickers().await?;
        Ok(tickers
            .into_iter()
            .filter_map(|t| {
                let last_price = t.last_price_f64();
                let change = t.price_change_percent_f64();
                match (last_price, change) {
                    (Some(last_price), Some(change_24h_pct)) => Some(TickerStats {
                        symbol: t.symbol,
                        last_price,
                        change_24h_pct,
                    }),
                    _ => {
                        warn!("Skipping ticker {} with unparseable prices", t.symbol);
                        None
                    }
                }
            })
            .collect())
    }

    async fn klines(
        &self,
        symbol: &str,
        interval: KlineInterval,
        start: DateTime<Utc>,
        limit: Option<u32>,
    ) -> Result<Vec<Kline>> {
        let raw = self
            .get_klines(symbol, interval, start.timestamp_millis(), limit)
            .await?;
        Ok(raw
            .iter()
            .filter_map(|k| {
                Some(Kline {
                    open_time: DateTime::from_timestamp_millis(k.open_time())?,
                    open: k.open_f64()?,
                })
            })
            .collect())
    }

    async fn wallet_balance(&self) -> Result<WalletBalance> {
        let balances = self.get_balances().await?;
        Ok(balances
            .iter()
            .find(|b| b.asset == "USDT")
            .map(|b| WalletBalance {
                balance: b.balance_f64(),
                unrealized_pnl: b.cross_un_pnl_f64(),
            })
            .unwrap_or_default())
    }

    async fn positions(&self) -> Result<Vec<PositionSnapshot>> {
        let risks = self.get_position_risk().await?;
        Ok(risks
            .iter()
            .map(|p| PositionSnapshot {
                symbol: p.symbol.clone(),
                amount: p.amount(),
                entry_price: p.entry(),
                mark_price: p.mark(),
                leverage: p.leverage_u32(),
                unrealized_pnl: p.unrealized_pnl(),
            })
            .collect())
    }

    async fn stop_order_price(&self, symbol: &str) -> Result<Option<f64>> {
        let orders = self.get_open_orders(symbol).await?;
        Ok(orders
            .iter()
            .filter(|o| o.is_protective_stop())
            .find_map(|o| o.stop_price_f64()))
    }

    async fn lot_size(&self, symbol: &str) -> Result<Option<f64>> {
        let info = self.get_exchange_info().await?;
        Ok(info
            .symbols
            .iter()
            .find(|s| s.symbol == symbol)
            .and_then(|s| s.lot_size()))
    }
}

fn encode_query(params: &[(&str, String)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Hex HMAC-SHA256 of the query string, as Binance expects in `signature`
pub fn sign_query(secret: &str, query: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| MonitorError::InvalidEnv {
        name: "BINANCE_API_SECRET",
        value: e.to_string(),
    })?;
    mac.update(query.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

async fn decode_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let (code, msg) = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(err) => (err.code, err.msg),
            Err(_) => (0, body),
        };
        return Err(MonitorError::Api {
            status: status.as_u16(),
            code,
            msg,
        });
    }

    Ok(serde_json::from_str(&body)?)
}
