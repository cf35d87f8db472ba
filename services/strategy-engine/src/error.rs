//! Strategy engine error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Z-score series has {actual} values but the price series has {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Market data error: {0}")]
    MarketData(#[from] data_retrieval::DataRetrievalError),
}

impl StrategyError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        StrategyError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StrategyError>;
