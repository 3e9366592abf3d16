pub mod rest;
pub mod types;

pub use rest::BinanceClient;
pub use types::{
    ExchangeInfo, FuturesBalance, OpenOrder, PositionRisk, RawKline, ServerTime, SymbolInfo,
    Ticker24hr,
};
