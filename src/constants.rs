//! Application-wide constants and magic numbers
//!
//! This module centralizes the hardcoded order rules, simulator defaults
//! and exchange settings so they can be tuned in one place.

use rust_decimal::Decimal;
use std::time::Duration;

/// Order rules enforced before anything reaches an execution backend
pub mod orders {
    use super::*;

    /// Every tradable symbol is quoted in this asset (e.g. BTCUSDT)
    pub const QUOTE_ASSET: &str = "USDT";

    /// Quantity is rounded to this many decimal places (lot step 0.001)
    pub const QUANTITY_PRECISION: u32 = 3;

    /// Prices are rounded to this many decimal places (tick 0.01)
    pub const PRICE_PRECISION: u32 = 2;

    /// Smallest accepted order quantity (0.001)
    pub fn min_quantity() -> Decimal {
        Decimal::new(1, 3)
    }
}

/// Submission pipeline constants
pub mod execution {
    use super::*;

    /// Upper bound on a single submission before it is reported as a timeout
    pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

    pub const TIMEOUT_MESSAGE: &str = "timeout";
    pub const NOT_CONNECTED_MESSAGE: &str = "not connected";
    pub const CONNECT_IN_PROGRESS_MESSAGE: &str = "connection already in progress";
}

/// Synthetic backend defaults
pub mod simulator {
    use super::*;

    /// Probability that a simulated submission is rejected (10%)
    pub const DEFAULT_FAILURE_PROBABILITY: f64 = 0.1;

    pub const FAILURE_MESSAGE: &str = "insufficient balance or network issue";

    /// Fake round-trip latency per submission
    pub const DEFAULT_LATENCY: Duration = Duration::from_millis(2000);

    /// Fake handshake latency for the connect action
    pub const DEFAULT_CONNECT_LATENCY: Duration = Duration::from_millis(1500);

    /// Order ids start somewhere below this bound and count up
    pub const ORDER_ID_SEED_BOUND: u64 = 1_000_000;

    /// MARKET fills are drawn uniformly from [min, max)
    pub fn default_fill_price_min() -> Decimal {
        Decimal::new(30_000, 0)
    }

    pub fn default_fill_price_max() -> Decimal {
        Decimal::new(40_000, 0)
    }
}

/// Binance Spot REST settings
pub mod binance {
    pub const TESTNET_BASE_URL: &str = "https://testnet.binance.vision";
    pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";
    pub const DEFAULT_RECV_WINDOW_MS: u64 = 5000;

    pub const PING_PATH: &str = "/api/v3/ping";
    pub const ACCOUNT_PATH: &str = "/api/v3/account";
    pub const EXCHANGE_INFO_PATH: &str = "/api/v3/exchangeInfo";
    pub const ORDER_PATH: &str = "/api/v3/order";
    pub const TEST_ORDER_PATH: &str = "/api/v3/order/test";
    pub const OCO_ORDER_PATH: &str = "/api/v3/order/oco";
    pub const TICKER_PRICE_PATH: &str = "/api/v3/ticker/price";
}

/// Logging event names for structured logging
pub mod events {
    pub const CONNECTING: &str = "connecting";
    pub const CONNECTED: &str = "connected";
    pub const CONNECT_FAILED: &str = "connect_failed";
    pub const ORDER_SUBMITTED: &str = "order_submitted";
    pub const ORDER_PLACED: &str = "order_placed";
    pub const ORDER_FAILED: &str = "order_failed";
    pub const ORDER_REJECTED: &str = "order_rejected";
    pub const ORDER_TIMEOUT: &str = "order_timeout";
}
