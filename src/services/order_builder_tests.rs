//! Unit tests for building order requests from raw form fields.

#[cfg(test)]
mod order_builder_tests {
    use crate::error::ValidationError;
    use crate::exchange::types::{OrderKind, Side};
    use crate::services::order_builder::*;
    use rust_decimal_macros::dec;

    fn builder() -> OrderBuilder {
        OrderBuilder::default()
    }

    // ============= Happy Path Tests =============

    #[test]
    fn test_build_market_order() {
        let fields = RawOrderFields::market("BTCUSDT", "BUY", "0.01").with_test(true);
        let req = builder().build(OrderKind::Market, &fields).unwrap();

        assert_eq!(req.kind, OrderKind::Market);
        assert_eq!(req.symbol, "BTCUSDT");
        assert_eq!(req.side, Side::Buy);
        assert_eq!(req.quantity, dec!(0.01));
        assert_eq!(req.price, None);
        assert!(req.is_test);
    }

    #[test]
    fn test_build_limit_order() {
        let fields = RawOrderFields::limit("ETHUSDT", "SELL", "0.5", "2000");
        let req = builder().build(OrderKind::Limit, &fields).unwrap();

        assert_eq!(req.kind, OrderKind::Limit);
        assert_eq!(req.side, Side::Sell);
        assert_eq!(req.price, Some(dec!(2000)));
        assert_eq!(req.stop_price, None);
        assert!(!req.is_test);
    }

    #[test]
    fn test_build_oco_order() {
        let fields = RawOrderFields::oco("BNBUSDT", "BUY", "1", "300", "290", "289");
        let req = builder().build(OrderKind::Oco, &fields).unwrap();

        assert_eq!(req.price, Some(dec!(300)));
        assert_eq!(req.stop_price, Some(dec!(290)));
        assert_eq!(req.stop_limit_price, Some(dec!(289)));
    }

    // ============= Missing Field Tests =============

    #[test]
    fn test_limit_without_price_is_missing_field() {
        let fields = RawOrderFields::market("ETHUSDT", "SELL", "0.5");
        let result = builder().build(OrderKind::Limit, &fields);
        assert_eq!(result, Err(ValidationError::MissingField { field: "price" }));
    }

    #[test]
    fn test_oco_requires_both_stop_prices() {
        let mut fields = RawOrderFields::oco("BNBUSDT", "BUY", "1", "300", "290", "289");
        fields.stop_limit_price = None;
        assert_eq!(
            builder().build(OrderKind::Oco, &fields),
            Err(ValidationError::MissingField { field: "stopLimitPrice" })
        );

        let mut fields = RawOrderFields::oco("BNBUSDT", "BUY", "1", "300", "290", "289");
        fields.stop_price = Some("   ".to_string());
        assert_eq!(
            builder().build(OrderKind::Oco, &fields),
            Err(ValidationError::MissingField { field: "stopPrice" })
        );
    }

    #[test]
    fn test_blank_symbol_is_missing() {
        let fields = RawOrderFields::market("", "BUY", "1");
        assert_eq!(
            builder().build(OrderKind::Market, &fields),
            Err(ValidationError::MissingField { field: "symbol" })
        );
    }

    #[test]
    fn test_missing_quantity() {
        let mut fields = RawOrderFields::market("BTCUSDT", "BUY", "1");
        fields.quantity = None;
        assert_eq!(
            builder().build(OrderKind::Market, &fields),
            Err(ValidationError::MissingField { field: "quantity" })
        );
    }

    // ============= Parsing & Normalization Tests =============

    #[test]
    fn test_symbol_and_side_are_normalized() {
        let fields = RawOrderFields::market("  btcusdt ", " sell", "1");
        let req = builder().build(OrderKind::Market, &fields).unwrap();
        assert_eq!(req.symbol, "BTCUSDT");
        assert_eq!(req.side, Side::Sell);
    }

    #[test]
    fn test_invalid_side() {
        let fields = RawOrderFields::market("BTCUSDT", "HOLD", "1");
        assert!(matches!(
            builder().build(OrderKind::Market, &fields),
            Err(ValidationError::InvalidSide { .. })
        ));
    }

    #[test]
    fn test_unparseable_quantity() {
        let fields = RawOrderFields::market("BTCUSDT", "BUY", "lots");
        assert_eq!(
            builder().build(OrderKind::Market, &fields),
            Err(ValidationError::InvalidNumber {
                field: "quantity",
                value: "lots".to_string(),
            })
        );
    }

    #[test]
    fn test_scientific_notation_accepted() {
        let fields = RawOrderFields::market("BTCUSDT", "BUY", "1e-2");
        let req = builder().build(OrderKind::Market, &fields).unwrap();
        assert_eq!(req.quantity, dec!(0.01));
    }

    #[test]
    fn test_quantity_and_prices_rounded() {
        let fields = RawOrderFields::limit("BTCUSDT", "BUY", "0.12345", "70000.129");
        let req = builder().build(OrderKind::Limit, &fields).unwrap();
        assert_eq!(req.quantity, dec!(0.123));
        assert_eq!(req.price, Some(dec!(70000.13)));
    }

    #[test]
    fn test_market_ignores_stray_prices() {
        let mut fields = RawOrderFields::market("BTCUSDT", "BUY", "1");
        fields.price = Some("-5".to_string());
        let req = builder().build(OrderKind::Market, &fields).unwrap();
        assert_eq!(req.price, None);
    }

    // ============= Validation Passthrough Tests =============

    #[test]
    fn test_invalid_symbol_from_builder() {
        let fields = RawOrderFields::market("BTCUSD", "BUY", "1");
        assert!(matches!(
            builder().build(OrderKind::Market, &fields),
            Err(ValidationError::InvalidSymbol { .. })
        ));
    }

    #[test]
    fn test_small_quantity_not_rescued_by_rounding() {
        // 0.0009 would round to 0.001, but the raw value is checked first
        let fields = RawOrderFields::market("BTCUSDT", "BUY", "0.0009");
        assert!(matches!(
            builder().build(OrderKind::Market, &fields),
            Err(ValidationError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn test_price_rounding_to_zero_rejected() {
        let fields = RawOrderFields::limit("BTCUSDT", "BUY", "1", "0.001");
        assert_eq!(
            builder().build(OrderKind::Limit, &fields),
            Err(ValidationError::InvalidPrice { price: dec!(0.00) })
        );
    }

    #[test]
    fn test_negative_stop_price_rejected() {
        let fields = RawOrderFields::oco("BNBUSDT", "BUY", "1", "300", "-290", "289");
        assert!(matches!(
            builder().build(OrderKind::Oco, &fields),
            Err(ValidationError::InvalidPrice { .. })
        ));
    }
}
