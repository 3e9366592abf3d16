/// Terminal and chat rendering for the monitor views
use crate::position::{PositionRow, PositionSide, WalletSummary};
use crate::price::PriceRow;
use crate::trade::TradePlan;
use colored::Colorize;
use num_format::{Locale, ToFormattedString};
use prettytable::format::consts::FORMAT_NO_LINESEP_WITH_TITLE;
use prettytable::{color, Attr, Cell, Row, Table};

/// Shown wherever a value could not be computed
pub const PLACEHOLDER: &str = "n/a";

const EMPTY_CELL: &str = "-";
const PROGRESS_BAR_CELLS: usize = 30;

const PRICE_HEADERS: [&str; 6] = ["Symbol", "Last Price", "15m %", "1h %", "Since Asia 8AM", "24h %"];

const POSITION_HEADERS: [&str; 14] = [
    "Symbol",
    "Side",
    "Lev",
    "Entry",
    "Mark",
    "Used Margin (USD)",
    "Position Size (USD)",
    "PnL",
    "PnL%",
    "Risk%",
    "SL Price",
    "% to SL",
    "SL USD",
    "SL Order",
];

const TRADE_HEADERS: [&str; 9] = [
    "Symbol", "Side", "Lev", "Price", "Lot", "Quantity", "Notional", "SL Price", "SL USD",
];

/// Color class of a rendered value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Green,
    Yellow,
    Red,
    Plain,
}

impl Tone {
    fn table_color(self) -> Option<color::Color> {
        match self {
            Tone::Green => Some(color::GREEN),
            Tone::Yellow => Some(color::YELLOW),
            Tone::Red => Some(color::RED),
            Tone::Plain => None,
        }
    }
}

/// Green above zero, red below, yellow at zero
pub fn change_tone(value: f64) -> Tone {
    if value > 0.0 {
        Tone::Green
    } else if value < 0.0 {
        Tone::Red
    } else {
        Tone::Yellow
    }
}

/// Distance to stop: red under 2%, yellow under 3.5%, green otherwise
pub fn stop_distance_tone(percent_to_stop: f64) -> Tone {
    let distance = percent_to_stop.abs();
    if distance < 2.0 {
        Tone::Red
    } else if distance < 3.5 {
        Tone::Yellow
    } else {
        Tone::Green
    }
}

/// Total SL risk as a share of wallet: red above 50%, yellow above 30%
pub fn sl_risk_tone(share_of_wallet: Option<f64>) -> Tone {
    match share_of_wallet {
        Some(pct) if pct > 50.0 => Tone::Red,
        Some(pct) if pct > 30.0 => Tone::Yellow,
        Some(_) => Tone::Green,
        None => Tone::Plain,
    }
}

/// `$14,899.70`, `-$50.00`
pub fn format_usd(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!(
        "{}${}.{:02}",
        sign,
        (cents / 100).to_formatted_string(&Locale::en),
        cents % 100
    )
}

/// Signed percentage, `+2.50%`
pub fn format_pct(value: f64) -> String {
    format!("{:+.2}%", value)
}

pub fn format_opt_pct(value: Option<f64>) -> String {
    value.map(format_pct).unwrap_or_else(|| PLACEHOLDER.to_string())
}

/// Up to 5 decimals, at least 2
pub fn format_price(value: f64) -> String {
    let mut text = format!("{:.5}", value);
    while text.ends_with('0') && text.len() - text.find('.').unwrap_or(text.len()) > 3 {
        text.pop();
    }
    text
}

/// Wrap `text` in the terminal color for `tone`
pub fn paint(text: &str, tone: Tone, colored: bool) -> String {
    if !colored {
        return text.to_string();
    }
    match tone {
        Tone::Green => text.green().to_string(),
        Tone::Yellow => text.yellow().to_string(),
        Tone::Red => text.red().to_string(),
        Tone::Plain => text.to_string(),
    }
}

fn cell(text: &str, tone: Tone, colored: bool) -> Cell {
    let cell = Cell::new(text);
    match tone.table_color() {
        Some(c) if colored => cell.with_style(Attr::ForegroundColor(c)),
        _ => cell,
    }
}

fn pct_cell(value: Option<f64>, colored: bool) -> Cell {
    match value {
        Some(v) => cell(&format_pct(v), change_tone(v), colored),
        None => Cell::new(PLACEHOLDER),
    }
}

fn header_row(headers: &[&str], colored: bool) -> Row {
    Row::new(
        headers
            .iter()
            .map(|h| {
                if colored {
                    Cell::new(h)
                        .with_style(Attr::Bold)
                        .with_style(Attr::ForegroundColor(color::BRIGHT_CYAN))
                } else {
                    Cell::new(h)
                }
            })
            .collect(),
    )
}

fn new_table(headers: &[&str], colored: bool) -> Table {
    let mut table = Table::new();
    if !colored {
        table.set_format(*FORMAT_NO_LINESEP_WITH_TITLE);
    }
    table.set_titles(header_row(headers, colored));
    table
}

pub fn price_table(rows: &[PriceRow], colored: bool) -> Table {
    let mut table = new_table(&PRICE_HEADERS, colored);

    for row in rows {
        match row {
            PriceRow::Quote {
                symbol,
                last_price,
                changes,
            } => {
                let symbol_cell = if colored {
                    Cell::new(symbol).with_style(Attr::Bold)
                } else {
                    Cell::new(symbol)
                };
                table.add_row(Row::new(vec![
                    symbol_cell,
                    Cell::new(&format_price(*last_price)),
                    pct_cell(changes.change_15m, colored),
                    pct_cell(changes.change_1h, colored),
                    pct_cell(changes.change_session, colored),
                    pct_cell(Some(changes.change_24h), colored),
                ]));
            }
            PriceRow::Error { symbol, reason } => {
                table.add_row(Row::new(vec![
                    Cell::new(symbol),
                    cell(&format!("error: {}", reason), Tone::Red, colored),
                    Cell::new(PLACEHOLDER),
                    Cell::new(PLACEHOLDER),
                    Cell::new(PLACEHOLDER),
                    Cell::new(PLACEHOLDER),
                ]));
            }
        }
    }
    table
}

pub fn position_table(rows: &[PositionRow], wallet_balance: f64, colored: bool) -> Table {
    let mut table = new_table(&POSITION_HEADERS, colored);

    for row in rows {
        match row {
            PositionRow::Open(position) => {
                let m = &position.metrics;
                let side = position.side.as_str();
                let side_tone = match position.side {
                    PositionSide::Long => Tone::Green,
                    PositionSide::Short => Tone::Red,
                };
                let to_stop = match m.percent_to_stop {
                    Some(pct) => cell(&format_pct(pct), stop_distance_tone(pct), colored),
                    None => Cell::new(PLACEHOLDER),
                };
                let risk_share = position
                    .margin_share_pct(wallet_balance)
                    .map(|pct| format!("{:.2}%", pct))
                    .unwrap_or_else(|| PLACEHOLDER.to_string());
                let stop_order = position
                    .stop_order_price
                    .map(format_price)
                    .unwrap_or_else(|| EMPTY_CELL.to_string());

                table.add_row(Row::new(vec![
                    Cell::new(&position.snapshot.symbol),
                    cell(side, side_tone, colored),
                    Cell::new(&format!("{}x", m.leverage)),
                    Cell::new(&format_price(position.snapshot.entry_price)),
                    Cell::new(&format_price(position.snapshot.mark_price)),
                    Cell::new(&format_usd(m.used_margin)),
                    Cell::new(&format_usd(m.notional)),
                    cell(&format_usd(m.unrealized_pnl), change_tone(m.unrealized_pnl), colored),
                    pct_cell(m.pnl_percent, colored),
                    Cell::new(&risk_share),
                    Cell::new(&format_price(m.stop_loss_price)),
                    to_stop,
                    Cell::new(&format_usd(m.sl_usd_at_risk)),
                    Cell::new(&stop_order),
                ]));
            }
            PositionRow::Empty { symbol, leverage } => {
                let mut cells = vec![
                    Cell::new(symbol),
                    Cell::new(EMPTY_CELL),
                    Cell::new(&format!("{}x", leverage)),
                ];
                cells.extend((3..POSITION_HEADERS.len()).map(|_| Cell::new(EMPTY_CELL)));
                table.add_row(Row::new(cells));
            }
        }
    }
    table
}

pub fn trade_plan_table(plan: &TradePlan, colored: bool) -> Table {
    let mut table = new_table(&TRADE_HEADERS, colored);

    for order in &plan.orders {
        let quantity = if order.is_executable() {
            Cell::new(&format_price(order.quantity))
        } else {
            cell("below lot size", Tone::Yellow, colored)
        };
        table.add_row(Row::new(vec![
            Cell::new(&order.symbol),
            Cell::new(order.side.as_str()),
            Cell::new(&format!("{}x", order.leverage)),
            Cell::new(&format_price(order.price)),
            Cell::new(&format_price(order.lot_size)),
            quantity,
            Cell::new(&format_usd(order.notional)),
            Cell::new(&format_price(order.stop_loss_price)),
            Cell::new(&format_usd(order.sl_usd_at_risk)),
        ]));
    }
    table
}

/// Wallet header lines above the position table
pub fn wallet_summary_lines(summary: &WalletSummary, colored: bool) -> Vec<String> {
    let unrealized = paint(
        &format_usd(summary.unrealized_pnl),
        change_tone(summary.unrealized_pnl),
        colored,
    );
    let unrealized_share = match summary.unrealized_pct {
        Some(pct) => paint(&format_pct(pct), change_tone(pct), colored),
        None => PLACEHOLDER.to_string(),
    };
    let risk_text = match summary.sl_risk_pct {
        Some(pct) => format!("{} ({:.2}%)", format_usd(summary.total_sl_risk), pct),
        None => format_usd(summary.total_sl_risk),
    };

    vec![
        format!("💰 Wallet Balance: {}", format_usd(summary.wallet_balance)),
        format!("💼 Available Balance: {}", format_usd(summary.available_balance)),
        format!("📊 Total Unrealized PnL: {} ({} of wallet)", unrealized, unrealized_share),
        format!("🧾 Wallet w/ Unrealized: {}", format_usd(summary.total_with_unrealized)),
        format!(
            "⚠️ Total SL Risk: {}",
            paint(&risk_text, sl_risk_tone(summary.sl_risk_pct), colored)
        ),
    ]
}

/// `Wallet Target: $cur / $target |███---| 52.3%`; `None` without a target
pub fn progress_bar(current: f64, target: f64, colored: bool) -> Option<String> {
    if target <= 0.0 {
        return None;
    }
    let ratio = (current / target).clamp(0.0, 1.0);
    let filled = ((ratio * PROGRESS_BAR_CELLS as f64).floor() as usize).min(PROGRESS_BAR_CELLS);
    let bar = format!("{}{}", "█".repeat(filled), "-".repeat(PROGRESS_BAR_CELLS - filled));
    let tone = if ratio >= 1.0 {
        Tone::Green
    } else if ratio >= 0.5 {
        Tone::Yellow
    } else {
        Tone::Red
    };

    Some(format!(
        "Wallet Target: {} / {} |{}| {:.1}%",
        format_usd(current),
        format_usd(target),
        paint(&bar, tone, colored),
        ratio * 100.0
    ))
}

/// Per-symbol problems printed under a table
pub fn error_lines(errors: &[(String, String)]) -> Vec<String> {
    errors
        .iter()
        .map(|(symbol, reason)| format!("❌ {}: {}", symbol, reason))
        .collect()
}

pub fn clear_screen() {
    print!("\x1B[2J\x1B[1;1H");
}
