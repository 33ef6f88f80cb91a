//! Custom error types for the order desk
//!
//! Local validation errors never leave the process; execution failures are
//! what a backend reports after a submission attempt.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::constants::execution::{
    CONNECT_IN_PROGRESS_MESSAGE, NOT_CONNECTED_MESSAGE, TIMEOUT_MESSAGE,
};

/// Pre-submission errors raised by the validator and the request builder
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Symbol must end with {quote_asset} (e.g., BTC{quote_asset}), got '{symbol}'")]
    InvalidSymbol { symbol: String, quote_asset: String },

    #[error("Quantity must be at least {min}, got {quantity}")]
    InvalidQuantity { quantity: Decimal, min: Decimal },

    #[error("All prices must be positive numbers, got {price}")]
    InvalidPrice { price: Decimal },

    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("Side must be BUY or SELL, got '{side}'")]
    InvalidSide { side: String },

    #[error("{field} must be a number, got '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Malformed order request: {reason}")]
    MalformedRequest { reason: String },
}

/// Terminal failure of a submission. Never retried automatically.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct ExecutionFailure {
    pub message: String,
}

impl ExecutionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn timeout() -> Self {
        Self::new(TIMEOUT_MESSAGE)
    }

    pub fn not_connected() -> Self {
        Self::new(NOT_CONNECTED_MESSAGE)
    }

    pub fn connect_in_progress() -> Self {
        Self::new(CONNECT_IN_PROGRESS_MESSAGE)
    }

    pub fn is_timeout(&self) -> bool {
        self.message == TIMEOUT_MESSAGE
    }
}

/// Exchange-specific errors raised by real backends
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Binance error ({code}): {msg}")]
    Api { code: i64, msg: String },

    #[error("Quantity {quantity} is below the {symbol} lot step {step}")]
    BelowLotStep {
        symbol: String,
        quantity: Decimal,
        step: Decimal,
    },

    #[error("Signature error: {0}")]
    Signature(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl From<ExchangeError> for ExecutionFailure {
    fn from(err: ExchangeError) -> Self {
        ExecutionFailure::new(err.to_string())
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Anything that can stop an order from being placed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution failed: {0}")]
    Execution(#[from] ExecutionFailure),
}
