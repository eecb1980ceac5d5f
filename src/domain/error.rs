//! Domain error types.

/// Failures reported by an exchange collaborator. Any of these means the
/// order was not filled.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExchangeError {
    #[error("rate limited by exchange")]
    RateLimited,

    #[error("exchange authentication failed")]
    AuthFailed,

    #[error("insufficient funds for order")]
    InsufficientFunds,

    #[error("network error: {0}")]
    Network(String),
}

/// Top-level error type for tradebot.
#[derive(Debug, thiserror::Error)]
pub enum TradebotError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("insufficient data: have {have} values, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("window {window} too small, need at least {min}")]
    InvalidWindow { window: usize, min: usize },

    #[error("malformed price series at index {index}: {reason}")]
    MalformedSeries { index: usize, reason: String },

    #[error("invalid fill for {symbol}: {reason}")]
    InvalidFill { symbol: String, reason: String },

    #[error("simulation is {state}, expected {expected}")]
    InvalidState {
        state: &'static str,
        expected: &'static str,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TradebotError {
    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TradebotError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn config_missing(section: &str, key: &str) -> Self {
        TradebotError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            TradebotError::ConfigParse { .. }
                | TradebotError::ConfigMissing { .. }
                | TradebotError::ConfigInvalid { .. }
        )
    }
}

impl From<&TradebotError> for std::process::ExitCode {
    fn from(err: &TradebotError) -> Self {
        let code: u8 = match err {
            TradebotError::Io(_) | TradebotError::InvalidState { .. } => 1,
            TradebotError::ConfigParse { .. }
            | TradebotError::ConfigMissing { .. }
            | TradebotError::ConfigInvalid { .. }
            | TradebotError::InvalidWindow { .. } => 2,
            TradebotError::Csv(_) | TradebotError::Data { .. } => 3,
            TradebotError::InvalidFill { .. } => 4,
            TradebotError::InsufficientData { .. } | TradebotError::MalformedSeries { .. } => 5,
            TradebotError::Exchange(_) => 6,
        };
        std::process::ExitCode::from(code)
    }
}
