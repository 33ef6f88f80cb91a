//! Order Desk - order entry core for a spot crypto exchange
//!
//! This library turns raw order form fields into validated MARKET, LIMIT
//! and OCO requests, submits them to an execution backend (a Binance Spot
//! client or a local response simulator), and keeps a log of display-ready
//! outcomes.

pub mod api;
pub mod clock;
pub mod config;
pub mod connection;
pub mod constants;
pub mod error;
pub mod exchange;
pub mod services;

// Re-export commonly used types
pub use config::AppConfig;
pub use connection::{ConnectionState, ConnectionStatus};
pub use error::{ExecutionFailure, OrderError, ValidationError};
pub use exchange::traits::ExecutionClient;
pub use exchange::types::{OrderKind, OrderRequest, OrderResult, OrderStatus, Side};
pub use services::desk::OrderDesk;
