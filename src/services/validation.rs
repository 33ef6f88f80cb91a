use rust_decimal::Decimal;

use crate::config::OrderRulesConfig;
use crate::constants::orders;
use crate::error::ValidationError;
use crate::exchange::types::Side;

/// Symbol, quantity and price limits every order must satisfy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderRules {
    pub quote_asset: String,
    pub min_quantity: Decimal,
    pub quantity_precision: u32,
    pub price_precision: u32,
}

impl Default for OrderRules {
    fn default() -> Self {
        Self {
            quote_asset: orders::QUOTE_ASSET.to_string(),
            min_quantity: orders::min_quantity(),
            quantity_precision: orders::QUANTITY_PRECISION,
            price_precision: orders::PRICE_PRECISION,
        }
    }
}

impl From<&OrderRulesConfig> for OrderRules {
    fn from(config: &OrderRulesConfig) -> Self {
        Self {
            quote_asset: config.quote_asset.to_uppercase(),
            min_quantity: config.min_quantity,
            quantity_precision: config.quantity_precision,
            price_precision: config.price_precision,
        }
    }
}

impl OrderRules {
    /// Checks run in order: symbol, quantity, then each present price.
    /// Absent prices are never an error here; presence is the builder's job.
    pub fn validate(
        &self,
        symbol: &str,
        _side: Side,
        quantity: Decimal,
        prices: &[Option<Decimal>],
    ) -> Result<(), ValidationError> {
        if !symbol.ends_with(&self.quote_asset) {
            return Err(ValidationError::InvalidSymbol {
                symbol: symbol.to_string(),
                quote_asset: self.quote_asset.clone(),
            });
        }

        if quantity < self.min_quantity {
            return Err(ValidationError::InvalidQuantity {
                quantity,
                min: self.min_quantity,
            });
        }

        if let Some(price) = prices.iter().flatten().find(|p| **p <= Decimal::ZERO) {
            return Err(ValidationError::InvalidPrice { price: *price });
        }

        Ok(())
    }
}

/// [`OrderRules::validate`] with the default USDT / 0.001 rules
pub fn validate(
    symbol: &str,
    side: Side,
    quantity: Decimal,
    prices: &[Option<Decimal>],
) -> Result<(), ValidationError> {
    OrderRules::default().validate(symbol, side, quantity, prices)
}
