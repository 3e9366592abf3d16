/// Coins config loading/validation and environment settings
use crate::error::{MonitorError, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "config/coins.json";

pub const MIN_LEVERAGE: f64 = 1.0;
pub const MAX_LEVERAGE: f64 = 150.0;
pub const MIN_STOP_LOSS_PCT: f64 = 0.1;
pub const MAX_STOP_LOSS_PCT: f64 = 100.0;

/// Risk parameters for one configured symbol
#[derive(Debug, Clone, PartialEq)]
pub struct CoinConfig {
    pub symbol: String,
    pub leverage: u32,
    pub stop_loss_percent: f64,
}

/// Per-symbol configuration in file order.
///
/// File order is the "default" sort order for every table.
#[derive(Debug, Clone, Default)]
pub struct CoinsConfig {
    coins: Vec<CoinConfig>,
}

impl CoinsConfig {
    pub fn new(coins: Vec<CoinConfig>) -> Self {
        Self { coins }
    }

    /// Load and validate the coins file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_text = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|source| MonitorError::ConfigRead {
            path: path_text.clone(),
            source,
        })?;
        let config = Self::from_json_str(&content).map_err(|e| match e {
            MonitorError::Json(err) => MonitorError::ConfigParse {
                path: path_text.clone(),
                reason: err.to_string(),
            },
            other => other,
        })?;
        info!("Loaded {} symbols from {}", config.len(), path_text);
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        Self::from_value(&value)
    }

    /// Validate a parsed JSON document.
    ///
    /// Shape: `{"BTCUSDT": {"leverage": 25, "stop_loss_percent": 2.0}, ...}`.
    /// `sl_percent` is accepted in place of `stop_loss_percent`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value.as_object().ok_or_else(|| MonitorError::InvalidConfig {
            symbol: "<root>".to_string(),
            reason: "config must be a JSON object of symbol -> parameters".to_string(),
        })?;

        let coins = map
            .iter()
            .map(|(symbol, params)| parse_coin(symbol, params))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { coins })
    }

    pub fn get(&self, symbol: &str) -> Option<&CoinConfig> {
        self.coins.iter().find(|c| c.symbol == symbol)
    }

    /// Position of `symbol` in file order
    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.coins.iter().position(|c| c.symbol == symbol)
    }

    pub fn symbols(&self) -> Vec<String> {
        self.coins.iter().map(|c| c.symbol.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CoinConfig> {
        self.coins.iter()
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }
}

fn parse_coin(symbol: &str, params: &Value) -> Result<CoinConfig> {
    let invalid = |reason: String| MonitorError::InvalidConfig {
        symbol: symbol.to_string(),
        reason,
    };

    let params: &Map<String, Value> = params
        .as_object()
        .ok_or_else(|| invalid("parameters must be a JSON object".to_string()))?;

    let leverage = params
        .get("leverage")
        .ok_or_else(|| invalid("missing 'leverage'".to_string()))?
        .as_f64()
        .ok_or_else(|| invalid("leverage must be a number".to_string()))?;
    if !(MIN_LEVERAGE..=MAX_LEVERAGE).contains(&leverage) {
        return Err(invalid(format!(
            "leverage {} out of range [{}, {}]",
            leverage, MIN_LEVERAGE, MAX_LEVERAGE
        )));
    }
    if leverage.fract() != 0.0 {
        return Err(invalid(format!("leverage {} must be a whole number", leverage)));
    }

    let stop_loss = params
        .get("stop_loss_percent")
        .or_else(|| params.get("sl_percent"))
        .ok_or_else(|| invalid("missing 'stop_loss_percent'".to_string()))?
        .as_f64()
        .ok_or_else(|| invalid("stop_loss_percent must be a number".to_string()))?;
    if !(MIN_STOP_LOSS_PCT..=MAX_STOP_LOSS_PCT).contains(&stop_loss) {
        return Err(invalid(format!(
            "stop_loss_percent {} out of range [{}, {}]",
            stop_loss, MIN_STOP_LOSS_PCT, MAX_STOP_LOSS_PCT
        )));
    }

    Ok(CoinConfig {
        symbol: symbol.to_string(),
        leverage: leverage as u32,
        stop_loss_percent: stop_loss,
    })
}

/// Binance API credentials
#[derive(Debug, Clone)]
pub struct BinanceCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl BinanceCredentials {
    /// Read `BINANCE_API_KEY` / `BINANCE_API_SECRET`
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: require_env("BINANCE_API_KEY")?,
            api_secret: require_env("BINANCE_API_SECRET")?,
        })
    }
}

/// Runtime settings read from the environment (after `.env` is loaded)
#[derive(Debug, Clone)]
pub struct Settings {
    pub credentials: Option<BinanceCredentials>,
    pub base_url: Option<String>,
    pub wallet_target: f64,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let credentials = BinanceCredentials::from_env().ok();
        let base_url = std::env::var("BINANCE_BASE_URL").ok().filter(|s| !s.is_empty());
        let wallet_target = parse_wallet_target(std::env::var("WALLET_TARGET").ok().as_deref())?;

        Ok(Self {
            credentials,
            base_url,
            wallet_target,
        })
    }
}

fn parse_wallet_target(raw: Option<&str>) -> Result<f64> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(0.0),
        Some(s) => s
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| MonitorError::InvalidEnv {
                name: "WALLET_TARGET",
                value: s.to_string(),
            }),
    }
}

pub(crate) fn require_env(name: &'static str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(MonitorError::MissingEnv(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn err_text(value: Value) -> String {
        CoinsConfig::from_value(&value).unwrap_err().to_string()
    }

    #[test]
    fn test_valid_config_keeps_file_order() {
        let config = CoinsConfig::from_json_str(
            r#"{"SOLUSDT": {"leverage": 20, "stop_loss_percent": 3.5},
                "BTCUSDT": {"leverage": 25, "stop_loss_percent": 2.0},
                "ETHUSDT": {"leverage": 20, "sl_percent": 2.5}}"#,
        )
        .unwrap();

        assert_eq!(config.symbols(), vec!["SOLUSDT", "BTCUSDT", "ETHUSDT"]);
        assert_eq!(config.index_of("BTCUSDT"), Some(1));
        let eth = config.get("ETHUSDT").unwrap();
        assert_eq!(eth.leverage, 20);
        assert_eq!(eth.stop_loss_percent, 2.5);
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config = CoinsConfig::from_value(&json!({})).unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn test_not_an_object() {
        assert!(err_text(json!([{"leverage": 25}])).contains("must be a JSON object"));
        assert!(err_text(json!({"BTCUSDT": "invalid"})).contains("must be a JSON object"));
    }

    #[test]
    fn test_missing_keys() {
        assert!(err_text(json!({"BTCUSDT": {"stop_loss_percent": 2.0}})).contains("missing 'leverage'"));
        assert!(err_text(json!({"BTCUSDT": {"leverage": 25}})).contains("missing 'stop_loss_percent'"));
    }

    #[test]
    fn test_non_numeric_values() {
        assert!(err_text(json!({"BTCUSDT": {"leverage": "high", "stop_loss_percent": 2.0}}))
            .contains("leverage must be a number"));
        assert!(err_text(json!({"BTCUSDT": {"leverage": 25, "stop_loss_percent": "tight"}}))
            .contains("stop_loss_percent must be a number"));
    }

    #[test]
    fn test_leverage_range() {
        assert!(err_text(json!({"BTCUSDT": {"leverage": 0, "stop_loss_percent": 2.0}})).contains("out of range"));
        assert!(err_text(json!({"BTCUSDT": {"leverage": 200, "stop_loss_percent": 2.0}})).contains("out of range"));
        assert!(err_text(json!({"BTCUSDT": {"leverage": 12.5, "stop_loss_percent": 2.0}})).contains("whole number"));

        for lev in [1, 150] {
            let config = CoinsConfig::from_value(&json!({"BTCUSDT": {"leverage": lev, "stop_loss_percent": 2.0}})).unwrap();
            assert_eq!(config.get("BTCUSDT").unwrap().leverage, lev);
        }
        let config = CoinsConfig::from_value(&json!({"BTCUSDT": {"leverage": 25.0, "stop_loss_percent": 3}})).unwrap();
        assert_eq!(config.get("BTCUSDT").unwrap().leverage, 25);
    }

    #[test]
    fn test_stop_loss_range() {
        assert!(err_text(json!({"BTCUSDT": {"leverage": 25, "stop_loss_percent": 0.05}})).contains("out of range"));
        assert!(err_text(json!({"BTCUSDT": {"leverage": 25, "stop_loss_percent": 150}})).contains("out of range"));
        assert!(CoinsConfig::from_value(&json!({"BTCUSDT": {"leverage": 25, "stop_loss_percent": 0.1}})).is_ok());
        assert!(CoinsConfig::from_value(&json!({"BTCUSDT": {"leverage": 25, "stop_loss_percent": 100}})).is_ok());
    }

    #[test]
    fn test_error_names_offending_symbol() {
        let text = err_text(json!({
            "BTCUSDT": {"leverage": 25, "stop_loss_percent": 2.0},
            "ETHUSDT": {"leverage": 0, "stop_loss_percent": 2.5}
        }));
        assert!(text.contains("ETHUSDT"));
        assert!(text.contains("out of range"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"BTCUSDT": {{"leverage": 25, "stop_loss_percent": 2.0}}}}"#).unwrap();

        let config = CoinsConfig::load(file.path()).unwrap();
        assert_eq!(config.len(), 1);
    }

    #[test]
    fn test_load_reports_missing_and_malformed_files() {
        let err = CoinsConfig::load("/nonexistent/coins.json").unwrap_err();
        assert!(matches!(err, MonitorError::ConfigRead { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = CoinsConfig::load(file.path()).unwrap_err();
        let expected = file.path().display().to_string();
        assert!(matches!(err, MonitorError::ConfigParse { ref path, .. } if *path == expected));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_parse_wallet_target() {
        assert_eq!(parse_wallet_target(None).unwrap(), 0.0);
        assert_eq!(parse_wallet_target(Some("")).unwrap(), 0.0);
        assert_eq!(parse_wallet_target(Some("2000")).unwrap(), 2000.0);
        assert!(parse_wallet_target(Some("lots")).is_err());
        assert!(parse_wallet_target(Some("-5")).is_err());
    }
}
