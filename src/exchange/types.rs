use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderKind {
    Market,
    Limit,
    /// One-cancels-the-other: a limit leg paired with a stop-limit leg
    Oco,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Market => "MARKET",
            OrderKind::Limit => "LIMIT",
            OrderKind::Oco => "OCO",
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            _ => Err(ValidationError::InvalidSide {
                side: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Accepted and resting on the book
    New,
    /// Test orders report FILLED; they never rest on a book
    Filled,
}

impl OrderStatus {
    pub fn for_submission(is_test: bool) -> Self {
        if is_test {
            OrderStatus::Filled
        } else {
            OrderStatus::New
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::New => f.write_str("NEW"),
            OrderStatus::Filled => f.write_str("FILLED"),
        }
    }
}

/// A validated order, ready for an execution backend.
///
/// Built per submission by the order builder and dropped once the backend
/// has answered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    #[serde(rename = "type")]
    pub kind: OrderKind,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub stop_limit_price: Option<Decimal>,
    pub is_test: bool,
}

impl OrderRequest {
    /// Every price carried by the request, present or not
    pub fn prices(&self) -> [Option<Decimal>; 3] {
        [self.price, self.stop_price, self.stop_limit_price]
    }
}

/// Backend answer to a successful submission. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    pub order_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_list_id: Option<u64>,
    pub status: OrderStatus,
    #[serde(rename = "type")]
    pub kind: OrderKind,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_limit_price: Option<Decimal>,
    /// MARKET only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_price: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

/// Exactly one of these is produced per submission.
pub type ExecutionOutcome = Result<OrderResult, crate::error::ExecutionFailure>;
