use thiserror::Error;

/// Errors raised by the monitor.
///
/// Variants fall into three groups: configuration / user input (the run aborts
/// before any network call), external dependencies (exchange or Telegram;
/// a surrounding loop retries on its next tick), and everything else.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {reason}")]
    ConfigParse { path: String, reason: String },

    #[error("Invalid config for {symbol}: {reason}")]
    InvalidConfig { symbol: String, reason: String },

    #[error("Open position on {0} has no entry in the coins config")]
    MissingSymbolConfig(String),

    #[error("Invalid sort '{input}': {reason}")]
    InvalidSortKey { input: String, reason: String },

    #[error("Missing environment variable {0}")]
    MissingEnv(&'static str),

    #[error("Environment variable {name} has invalid value '{value}'")]
    InvalidEnv { name: &'static str, value: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Exchange API error (HTTP {status}, code {code}): {msg}")]
    Api { status: u16, code: i64, msg: String },

    #[error("Failed to decode response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Telegram send failed: {0}")]
    Notify(String),
}

impl MonitorError {
    /// Configuration and user-input errors abort the run before any external call.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            MonitorError::ConfigRead { .. }
                | MonitorError::ConfigParse { .. }
                | MonitorError::InvalidConfig { .. }
                | MonitorError::MissingSymbolConfig(_)
                | MonitorError::InvalidSortKey { .. }
                | MonitorError::MissingEnv(_)
                | MonitorError::InvalidEnv { .. }
        )
    }

    /// Process exit code for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        if self.is_config_error() {
            2
        } else {
            1
        }
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
