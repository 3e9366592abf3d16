//! End-to-end passes against an in-memory exchange
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use moon_monitor::monitor::{position_pass, price_pass, TelegramOutput};
use moon_monitor::{
    collect_position_view, collect_price_report, plan_trades, CoinsConfig, ExchangeApi, Kline,
    KlineInterval, MonitorError, PositionOptions, PositionRow, PositionSide, PositionSnapshot,
    PositionSortKey, PriceOptions, PriceRow, Result, SortSpec, TelegramNotifier, TickerStats,
    TradeRequest, WalletBalance,
};
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct MockExchange {
    tickers: Vec<TickerStats>,
    /// (symbol, interval) -> open price of the returned candle
    opens: HashMap<(String, &'static str), f64>,
    wallet: WalletBalance,
    positions: Vec<PositionSnapshot>,
    stops: HashMap<String, f64>,
    lots: HashMap<String, f64>,
}

impl MockExchange {
    fn ticker(mut self, symbol: &str, last_price: f64, change_24h_pct: f64) -> Self {
        self.tickers.push(TickerStats {
            symbol: symbol.to_string(),
            last_price,
            change_24h_pct,
        });
        self
    }

    fn open(mut self, symbol: &str, interval: KlineInterval, price: f64) -> Self {
        self.opens.insert((symbol.to_string(), interval.as_str()), price);
        self
    }

    fn position(mut self, symbol: &str, amount: f64, entry: f64, mark: f64, pnl: f64) -> Self {
        self.positions.push(PositionSnapshot {
            symbol: symbol.to_string(),
            amount,
            entry_price: entry,
            mark_price: mark,
            leverage: None,
            unrealized_pnl: Some(pnl),
        });
        self
    }
}

#[async_trait]
impl ExchangeApi for MockExchange {
    async fn tickers_24h(&self) -> Result<Vec<TickerStats>> {
        Ok(self.tickers.clone())
    }

    async fn klines(
        &self,
        symbol: &str,
        interval: KlineInterval,
        start: DateTime<Utc>,
        _limit: Option<u32>,
    ) -> Result<Vec<Kline>> {
        match self.opens.get(&(symbol.to_string(), interval.as_str())) {
            Some(&open) => Ok(vec![Kline {
                open_time: start,
                open,
            }]),
            None => Err(MonitorError::Api {
                status: 400,
                code: -1121,
                msg: "Invalid symbol.".to_string(),
            }),
        }
    }

    async fn wallet_balance(&self) -> Result<WalletBalance> {
        Ok(self.wallet)
    }

    async fn positions(&self) -> Result<Vec<PositionSnapshot>> {
        Ok(self.positions.clone())
    }

    async fn stop_order_price(&self, symbol: &str) -> Result<Option<f64>> {
        Ok(self.stops.get(symbol).copied())
    }

    async fn lot_size(&self, symbol: &str) -> Result<Option<f64>> {
        Ok(self.lots.get(symbol).copied())
    }
}

fn coins() -> CoinsConfig {
    CoinsConfig::from_json_str(
        r#"{
            "BTCUSDT": {"leverage": 25, "stop_loss_percent": 2.0},
            "ETHUSDT": {"leverage": 20, "stop_loss_percent": 2.5},
            "SOLUSDT": {"leverage": 20, "sl_percent": 3.5}
        }"#,
    )
    .unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 16, 5, 15, 0).unwrap()
}

fn symbols(rows: &[PositionRow]) -> Vec<&str> {
    rows.iter().map(|r| r.symbol()).collect()
}

#[tokio::test]
async fn price_report_marks_missing_data() {
    let exchange = MockExchange::default()
        .ticker("BTCUSDT", 110.0, 2.31)
        .ticker("ETHUSDT", 2600.0, -1.5)
        .open("BTCUSDT", KlineInterval::FifteenMinutes, 100.0)
        .open("BTCUSDT", KlineInterval::OneHour, 110.0)
        .open("BTCUSDT", KlineInterval::OneMinute, 0.0)
        .open("ETHUSDT", KlineInterval::OneMinute, 2500.0);

    let report = collect_price_report(&exchange, &coins().symbols(), now()).await.unwrap();

    assert_eq!(report.rows.len(), 3);
    assert_eq!(report.errors, vec![("SOLUSDT".to_string(), "ticker not found".to_string())]);

    match &report.rows[0] {
        PriceRow::Quote { changes, .. } => {
            assert!((changes.change_15m.unwrap() - 10.0).abs() < 1e-9);
            assert_eq!(changes.change_1h, Some(0.0));
            // zero reference renders as unavailable
            assert_eq!(changes.change_session, None);
            assert_eq!(changes.change_24h, 2.31);
        }
        other => panic!("unexpected row: {other:?}"),
    }
    match &report.rows[1] {
        PriceRow::Quote { changes, .. } => {
            assert_eq!(changes.change_15m, None);
            assert!((changes.change_session.unwrap() - 4.0).abs() < 1e-9);
        }
        other => panic!("unexpected row: {other:?}"),
    }
    assert!(matches!(report.rows[2], PriceRow::Error { .. }));
}

#[tokio::test]
async fn price_pass_sorts_rows_with_unavailable_last() {
    let exchange = MockExchange::default()
        .ticker("BTCUSDT", 101.0, 1.0)
        .ticker("ETHUSDT", 2600.0, 5.0)
        .ticker("SOLUSDT", 150.0, -3.0);
    let options = PriceOptions {
        sort: SortSpec::parse("change_24h:asc").unwrap(),
        ..PriceOptions::default()
    };

    let report = price_pass(&exchange, &coins(), &options, None).await.unwrap();
    let order: Vec<&str> = report.rows.iter().map(|r| r.symbol()).collect();
    assert_eq!(order, vec!["SOLUSDT", "BTCUSDT", "ETHUSDT"]);
}

#[tokio::test]
async fn hide_empty_keeps_wallet_aggregates() {
    let mut exchange = MockExchange::default()
        .position("ETHUSDT", -4.5, 2616.17, 2550.10, 306.29)
        .position("BTCUSDT", -0.135, 110032.0, 108757.0, 174.73)
        .position("SOLUSDT", 0.0, 0.0, 143.22, 0.0);
    exchange.wallet = WalletBalance {
        balance: 1123.15,
        unrealized_pnl: 481.02,
    };
    exchange.stops.insert("BTCUSDT".to_string(), 112232.64);

    let full = collect_position_view(&exchange, &coins(), false).await.unwrap();
    let hidden = collect_position_view(&exchange, &coins(), true).await.unwrap();

    assert_eq!(symbols(&full.rows), vec!["BTCUSDT", "ETHUSDT", "SOLUSDT"]);
    assert_eq!(symbols(&hidden.rows), vec!["BTCUSDT", "ETHUSDT"]);
    assert_eq!(full.summary, hidden.summary);

    match &full.rows[0] {
        PositionRow::Open(p) => {
            assert_eq!(p.side, PositionSide::Short);
            assert_eq!(p.stop_order_price, Some(112232.64));
            assert!(p.metrics.stop_loss_price > p.snapshot.entry_price);
        }
        other => panic!("unexpected row: {other:?}"),
    }
}

#[tokio::test]
async fn position_sort_is_stable_on_ties() {
    // pnl percent 5, -2, 5 at 1x-equivalent margins
    let mut exchange = MockExchange::default()
        .position("BTCUSDT", 1.0, 100.0, 100.0, 0.2)
        .position("ETHUSDT", 1.0, 100.0, 100.0, -0.1)
        .position("SOLUSDT", 1.0, 100.0, 100.0, 0.25);
    exchange.wallet.balance = 1000.0;
    let options = PositionOptions {
        sort: SortSpec::parse("pnl_pct:desc").unwrap(),
        hide_empty: true,
        ..PositionOptions::default()
    };

    let view = position_pass(&exchange, &coins(), &options, None).await.unwrap();
    let pnl: Vec<f64> = view
        .rows
        .iter()
        .filter_map(|r| match r {
            PositionRow::Open(p) => p.metrics.pnl_percent,
            PositionRow::Empty { .. } => None,
        })
        .collect();

    assert!((pnl[0] - 5.0).abs() < 1e-9 && (pnl[1] - 5.0).abs() < 1e-9);
    assert_eq!(symbols(&view.rows), vec!["BTCUSDT", "SOLUSDT", "ETHUSDT"]);
    assert_eq!(options.sort.key, PositionSortKey::PnlPct);
}

#[tokio::test]
async fn unconfigured_position_is_a_config_error() {
    let exchange = MockExchange::default()
        .position("BTCUSDT", 0.1, 100.0, 100.0, 0.0)
        .position("DOGEUSDT", 1000.0, 0.1, 0.11, 10.0);

    let err = collect_position_view(&exchange, &coins(), false).await.unwrap_err();
    assert!(matches!(err, MonitorError::MissingSymbolConfig(ref s) if s == "DOGEUSDT"));
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn trade_plan_sizes_orders_by_lot() {
    let mut exchange = MockExchange::default()
        .ticker("BTCUSDT", 50000.0, 0.0)
        .ticker("ETHUSDT", 3000.0, 0.0);
    exchange.lots.insert("BTCUSDT".to_string(), 0.001);
    exchange.lots.insert("ETHUSDT".to_string(), 0.01);

    let request = TradeRequest {
        symbols: vec!["btcusdt".to_string(), "ETHUSDT".to_string(), "SOLUSDT".to_string()],
        margin_usd: 100.0,
        side: PositionSide::Long,
    };
    let plan = plan_trades(&exchange, &coins(), &request).await.unwrap();

    assert_eq!(plan.orders.len(), 2);
    // 100 × 25 / 50000 = 0.05
    assert!((plan.orders[0].quantity - 0.05).abs() < 1e-9);
    // 100 × 20 / 3000 = 0.666.. -> 0.66
    assert!((plan.orders[1].quantity - 0.66).abs() < 1e-9);
    assert!(plan.orders[1].stop_loss_price < 3000.0);
    assert_eq!(plan.errors, vec![("SOLUSDT".to_string(), "ticker not found".to_string())]);

    let unknown = TradeRequest {
        symbols: vec!["XRPUSDT".to_string()],
        ..request
    };
    let err = plan_trades(&exchange, &coins(), &unknown).await.unwrap_err();
    assert!(err.is_config_error());
}

fn funded_exchange() -> MockExchange {
    let mut exchange = MockExchange::default().position("BTCUSDT", 0.01, 100000.0, 101000.0, 10.0);
    exchange.wallet = WalletBalance {
        balance: 1000.0,
        unrealized_pnl: 10.0,
    };
    exchange
}

async fn telegram_server(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/botTOKEN/sendMessage"))
        .respond_with(ResponseTemplate::new(status))
        .expect(1)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn position_pass_sends_once_per_interval() {
    let server = telegram_server(200).await;
    let notifier = TelegramNotifier::with_base_url("TOKEN", "42", server.uri()).unwrap();
    let mut output = TelegramOutput::new(&notifier, Some(Duration::from_secs(600)));
    let exchange = funded_exchange();
    let options = PositionOptions::default();

    let view = position_pass(&exchange, &coins(), &options, Some(&mut output)).await.unwrap();
    assert_eq!(symbols(&view.rows), vec!["BTCUSDT", "ETHUSDT", "SOLUSDT"]);

    // interval not elapsed: no second request
    position_pass(&exchange, &coins(), &options, Some(&mut output)).await.unwrap();
}

#[tokio::test]
async fn failed_send_surfaces_and_counts_for_the_period() {
    let server = telegram_server(500).await;
    let notifier = TelegramNotifier::with_base_url("TOKEN", "42", server.uri()).unwrap();
    let mut output = TelegramOutput::new(&notifier, Some(Duration::from_secs(600)));
    let exchange = funded_exchange();
    let options = PositionOptions::default();

    let err = position_pass(&exchange, &coins(), &options, Some(&mut output))
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::Notify(ref msg) if msg.contains("500")));
    assert_eq!(err.exit_code(), 1);

    position_pass(&exchange, &coins(), &options, Some(&mut output)).await.unwrap();
}

#[tokio::test]
async fn compact_pass_keeps_summary_and_still_notifies() {
    let server = telegram_server(200).await;
    let notifier = TelegramNotifier::with_base_url("TOKEN", "42", server.uri()).unwrap();
    let mut output = TelegramOutput::new(&notifier, None);
    let exchange = funded_exchange();
    let compact = PositionOptions {
        compact: true,
        ..PositionOptions::default()
    };

    let view = position_pass(&exchange, &coins(), &compact, Some(&mut output)).await.unwrap();
    let full = collect_position_view(&exchange, &coins(), false).await.unwrap();
    assert_eq!(view.summary, full.summary);
    assert_eq!(view.summary.wallet_balance, 1000.0);

    let (_, table) = moon_monitor::monitor::position_screen(&view, &compact, false);
    assert!(table.is_none());
}

#[test]
fn coins_config_loads_from_file_in_order() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"SOLUSDT": {{"leverage": 20, "sl_percent": 3.5}}, "BTCUSDT": {{"leverage": 25, "stop_loss_percent": 2}}}}"#
    )
    .unwrap();

    let config = CoinsConfig::load(file.path()).unwrap();
    assert_eq!(config.symbols(), vec!["SOLUSDT", "BTCUSDT"]);
}

#[test]
fn session_anchor_used_by_pass_is_before_now() {
    let anchor = moon_monitor::session_open_anchor(now());
    assert!(anchor <= now());
    assert!(now() - anchor < chrono::TimeDelta::days(1));
}
