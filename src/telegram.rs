/// Telegram Bot API notifier and the chat messages it sends
use crate::config::require_env;
use crate::display;
use crate::error::{MonitorError, Result};
use crate::position::{PositionRow, WalletSummary};
use crate::price::PriceRow;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";
const SEND_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

pub struct TelegramNotifier {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
    base_url: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Result<Self> {
        Self::with_base_url(bot_token, chat_id, TELEGRAM_API_URL)
    }

    pub fn with_base_url(
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build from `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID`
    pub fn from_env() -> Result<Self> {
        let bot_token = require_env("TELEGRAM_BOT_TOKEN")?;
        let chat_id = require_env("TELEGRAM_CHAT_ID")?;
        Self::new(bot_token, chat_id)
    }

    /// Post one Markdown message. Failures are returned, never retried.
    pub async fn send(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "Markdown",
            disable_web_page_preview: true,
        };
        debug!("Sending Telegram message ({} chars)", text.len());

        // the request URL carries the bot token; keep it out of the error text
        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| MonitorError::Notify(e.without_url().to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MonitorError::Notify(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        info!("📨 Telegram message sent");
        Ok(())
    }
}

/// Plain price table wrapped in a Markdown code block
pub fn price_message(rows: &[PriceRow]) -> String {
    format!(
        "📈 Snapshot Price Monitor\n```\n{}\n```",
        display::price_table(rows, false).to_string().trim_end()
    )
}

/// Wallet summary plus one line per open position
pub fn position_message(summary: &WalletSummary, rows: &[PositionRow]) -> String {
    let mut lines = vec!["📌 Open Positions Snapshot".to_string(), String::new()];
    lines.extend(display::wallet_summary_lines(summary, false));

    let open: Vec<String> = rows
        .iter()
        .filter_map(|row| match row {
            PositionRow::Open(p) => Some(format!(
                "{} {} {}x  PnL {} ({})",
                p.snapshot.symbol,
                p.side,
                p.metrics.leverage,
                display::format_usd(p.metrics.unrealized_pnl),
                display::format_opt_pct(p.metrics.pnl_percent),
            )),
            PositionRow::Empty { .. } => None,
        })
        .collect();

    if !open.is_empty() {
        lines.push(String::new());
        lines.push("```".to_string());
        lines.extend(open);
        lines.push("```".to_string());
    }
    lines.join("\n")
}
