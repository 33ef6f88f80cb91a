//! Turns raw form fields into a validated [`OrderRequest`].
//!
//! This is the trust boundary in front of every execution client: whatever
//! the caller collected, presence, parsing, normalization and the order
//! rules are all re-checked here.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::exchange::types::{OrderKind, OrderRequest, Side};

use super::validation::OrderRules;

/// Field values as typed by the user; every field may be missing.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOrderFields {
    pub symbol: Option<String>,
    pub side: Option<String>,
    pub quantity: Option<String>,
    pub price: Option<String>,
    pub stop_price: Option<String>,
    pub stop_limit_price: Option<String>,
    #[serde(default)]
    pub test: bool,
}

impl RawOrderFields {
    pub fn market(symbol: &str, side: &str, quantity: &str) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            side: Some(side.to_string()),
            quantity: Some(quantity.to_string()),
            ..Self::default()
        }
    }

    pub fn limit(symbol: &str, side: &str, quantity: &str, price: &str) -> Self {
        Self {
            price: Some(price.to_string()),
            ..Self::market(symbol, side, quantity)
        }
    }

    pub fn oco(
        symbol: &str,
        side: &str,
        quantity: &str,
        price: &str,
        stop_price: &str,
        stop_limit_price: &str,
    ) -> Self {
        Self {
            stop_price: Some(stop_price.to_string()),
            stop_limit_price: Some(stop_limit_price.to_string()),
            ..Self::limit(symbol, side, quantity, price)
        }
    }

    pub fn with_test(mut self, test: bool) -> Self {
        self.test = test;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct OrderBuilder {
    rules: OrderRules,
}

impl OrderBuilder {
    pub fn new(rules: OrderRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &OrderRules {
        &self.rules
    }

    pub fn build(
        &self,
        kind: OrderKind,
        fields: &RawOrderFields,
    ) -> Result<OrderRequest, ValidationError> {
        let symbol = required(&fields.symbol, "symbol")?;
        let side = required(&fields.side, "side")?;
        let quantity = required(&fields.quantity, "quantity")?;

        let (price, stop_price, stop_limit_price) = match kind {
            OrderKind::Market => (None, None, None),
            OrderKind::Limit => (Some(required(&fields.price, "price")?), None, None),
            OrderKind::Oco => (
                Some(required(&fields.price, "price")?),
                Some(required(&fields.stop_price, "stopPrice")?),
                Some(required(&fields.stop_limit_price, "stopLimitPrice")?),
            ),
        };

        let symbol = symbol.to_uppercase();
        let side = Side::from_str(side)?;
        let quantity = parse_decimal(quantity, "quantity")?;
        let price = price.map(|p| parse_decimal(p, "price")).transpose()?;
        let stop_price = stop_price.map(|p| parse_decimal(p, "stopPrice")).transpose()?;
        let stop_limit_price = stop_limit_price
            .map(|p| parse_decimal(p, "stopLimitPrice"))
            .transpose()?;

        self.rules
            .validate(&symbol, side, quantity, &[price, stop_price, stop_limit_price])?;

        let request = OrderRequest {
            kind,
            symbol,
            side,
            quantity: quantity.round_dp(self.rules.quantity_precision),
            price: price.map(|p| p.round_dp(self.rules.price_precision)),
            stop_price: stop_price.map(|p| p.round_dp(self.rules.price_precision)),
            stop_limit_price: stop_limit_price.map(|p| p.round_dp(self.rules.price_precision)),
            is_test: fields.test,
        };

        // Rounding can push a tiny positive price down to zero
        self.rules.validate(
            &request.symbol,
            request.side,
            request.quantity,
            &request.prices(),
        )?;

        Ok(request)
    }
}

/// Present and non-blank, trimmed
fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, ValidationError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField { field }),
    }
}

fn parse_decimal(value: &str, field: &'static str) -> Result<Decimal, ValidationError> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(|_| ValidationError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}
