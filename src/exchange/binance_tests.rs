//! Unit tests for the Binance client: request/response helpers, and the
//! submit paths against a local mock exchange.

#[cfg(test)]
mod binance_tests {
    use crate::clock::{Clock, ManualClock};
    use crate::config::BinanceConfig;
    use crate::connection::{ConnectionState, ConnectionStatus};
    use crate::error::ExchangeError;
    use crate::exchange::binance::*;
    use crate::exchange::traits::ExecutionClient;
    use crate::exchange::types::*;
    use axum::{
        extract::{Query, State},
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Response},
        routing::{get, post},
        Json, Router,
    };
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn request(kind: OrderKind, is_test: bool) -> OrderRequest {
        OrderRequest {
            kind,
            symbol: "BTCUSDT".to_string(),
            side: Side::Buy,
            quantity: dec!(0.015),
            price: None,
            stop_price: None,
            stop_limit_price: None,
            is_test,
        }
    }

    fn param<'a>(params: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        params.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    // ============= Signing Tests =============

    #[test]
    fn test_signature_matches_documented_vector() {
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let payload = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";

        let signature = signature_hex(secret, payload).unwrap();

        assert_eq!(
            signature,
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_signature_is_lowercase_hex() {
        let signature = signature_hex("secret", "timestamp=1").unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_encode_query_keeps_order_and_escapes() {
        let params = vec![
            ("symbol", "BTCUSDT".to_string()),
            ("newClientOrderId", "a b&c".to_string()),
        ];
        assert_eq!(encode_query(&params), "symbol=BTCUSDT&newClientOrderId=a+b%26c");
    }

    // ============= Order Parameter Tests =============

    #[test]
    fn test_market_params() {
        let params = order_params(&request(OrderKind::Market, false), "desk-1").unwrap();

        assert_eq!(param(&params, "symbol"), Some("BTCUSDT"));
        assert_eq!(param(&params, "side"), Some("BUY"));
        assert_eq!(param(&params, "type"), Some("MARKET"));
        assert_eq!(param(&params, "quantity"), Some("0.015"));
        assert_eq!(param(&params, "newClientOrderId"), Some("desk-1"));
        assert_eq!(param(&params, "price"), None);
    }

    #[test]
    fn test_limit_params() {
        let mut req = request(OrderKind::Limit, false);
        req.price = Some(dec!(65000.50));

        let params = order_params(&req, "desk-2").unwrap();

        assert_eq!(param(&params, "type"), Some("LIMIT"));
        assert_eq!(param(&params, "timeInForce"), Some("GTC"));
        assert_eq!(param(&params, "price"), Some("65000.50"));
    }

    #[test]
    fn test_limit_params_without_price_fail() {
        let err = order_params(&request(OrderKind::Limit, false), "desk-3").unwrap_err();
        assert!(matches!(err, ExchangeError::UnexpectedResponse(msg) if msg.contains("price")));
    }

    #[test]
    fn test_oco_params() {
        let mut req = request(OrderKind::Oco, false);
        req.side = Side::Sell;
        req.price = Some(dec!(70000));
        req.stop_price = Some(dec!(60000));
        req.stop_limit_price = Some(dec!(59900));

        let params = order_params(&req, "desk-4").unwrap();

        assert_eq!(param(&params, "side"), Some("SELL"));
        assert_eq!(param(&params, "price"), Some("70000"));
        assert_eq!(param(&params, "stopPrice"), Some("60000"));
        assert_eq!(param(&params, "stopLimitPrice"), Some("59900"));
        assert_eq!(param(&params, "stopLimitTimeInForce"), Some("GTC"));
        assert_eq!(param(&params, "listClientOrderId"), Some("desk-4"));
        assert_eq!(param(&params, "type"), None);
    }

    // ============= Response Tests =============

    #[test]
    fn test_parse_api_error_body() {
        let err = parse_api_error(400, r#"{"code":-2010,"msg":"Account has insufficient balance for requested action."}"#);
        match err {
            ExchangeError::Api { code, msg } => {
                assert_eq!(code, -2010);
                assert!(msg.contains("insufficient balance"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_api_error_falls_back_to_http() {
        let err = parse_api_error(502, "<html>Bad Gateway</html>");
        assert!(matches!(err, ExchangeError::Http { status: 502, .. }));
    }

    #[test]
    fn test_average_fill_price_weights_by_qty() {
        let resp: OrderResponse = serde_json::from_str(
            r#"{
                "orderId": 28,
                "status": "FILLED",
                "executedQty": "3.00000000",
                "cummulativeQuoteQty": "0.00000000",
                "fills": [
                    {"price": "100.00", "qty": "1.00"},
                    {"price": "103.00", "qty": "2.00"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(average_fill_price(&resp), Some(dec!(102)));
    }

    #[test]
    fn test_average_fill_price_uses_totals_without_fills() {
        let resp: OrderResponse = serde_json::from_str(
            r#"{"orderId": 29, "executedQty": "2", "cummulativeQuoteQty": "70000"}"#,
        )
        .unwrap();

        assert_eq!(average_fill_price(&resp), Some(dec!(35000)));
    }

    #[test]
    fn test_average_fill_price_unfilled() {
        let resp: OrderResponse =
            serde_json::from_str(r#"{"orderId": 30, "status": "NEW"}"#).unwrap();
        assert_eq!(average_fill_price(&resp), None);
    }

    #[test]
    fn test_oco_ids_take_first_leg() {
        let resp: OcoResponse = serde_json::from_str(
            r#"{"orderListId": 77, "orders": [{"orderId": 501}, {"orderId": 502}]}"#,
        )
        .unwrap();
        assert_eq!(oco_ids(&resp).unwrap(), (501, 77));
    }

    #[test]
    fn test_oco_ids_empty_list() {
        let resp: OcoResponse =
            serde_json::from_str(r#"{"orderListId": 78, "orders": []}"#).unwrap();
        assert!(oco_ids(&resp).is_err());
    }

    #[test]
    fn test_local_result_status_follows_test_flag() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let test = local_result(&request(OrderKind::Market, true), 1, at);
        let live = local_result(&request(OrderKind::Market, false), 2, at);

        assert_eq!(test.status, OrderStatus::Filled);
        assert_eq!(live.status, OrderStatus::New);
        assert_eq!(live.order_id, 2);
        assert_eq!(live.timestamp, at);
    }

    // ============= Lot Step Tests =============

    #[test]
    fn test_floor_to_step() {
        assert_eq!(floor_to_step(dec!(0.015), dec!(0.01000000)), dec!(0.01));
        assert_eq!(floor_to_step(dec!(3.7), dec!(1)), dec!(3));
        assert_eq!(floor_to_step(dec!(0.123), dec!(0.001)), dec!(0.123));
        assert_eq!(floor_to_step(dec!(0.5), dec!(1)), dec!(0));
        // A zero step leaves the quantity alone
        assert_eq!(floor_to_step(dec!(0.5), dec!(0)), dec!(0.5));
    }

    #[test]
    fn test_lot_step_from_exchange_info() {
        let info: ExchangeInfo = serde_json::from_value(exchange_info_body("BTCUSDT", "0.01000000")).unwrap();
        assert_eq!(lot_step_from(&info, "BTCUSDT"), Some(dec!(0.01)));
        assert_eq!(lot_step_from(&info, "ETHUSDT"), None);
    }

    // ============= Client Tests (local mock exchange) =============

    const API_KEY: &str = "good-key";

    #[derive(Default)]
    struct MockExchange {
        /// (path, query params) per request, in arrival order
        hits: Mutex<Vec<(&'static str, HashMap<String, String>)>>,
    }

    impl MockExchange {
        fn record(&self, path: &'static str, params: HashMap<String, String>) {
            self.hits.lock().unwrap().push((path, params));
        }

        fn hits_on(&self, path: &str) -> Vec<HashMap<String, String>> {
            self.hits
                .lock()
                .unwrap()
                .iter()
                .filter(|(p, _)| *p == path)
                .map(|(_, q)| q.clone())
                .collect()
        }
    }

    fn exchange_info_body(symbol: &str, step: &str) -> Value {
        json!({
            "symbols": [{
                "symbol": symbol,
                "filters": [
                    {"filterType": "PRICE_FILTER", "minPrice": "0.01", "tickSize": "0.01"},
                    {"filterType": "LOT_SIZE", "minQty": "0.00001", "maxQty": "9000", "stepSize": step}
                ]
            }]
        })
    }

    fn api_error(status: StatusCode, code: i64, msg: &str) -> Response {
        (status, Json(json!({"code": code, "msg": msg}))).into_response()
    }

    fn signed(headers: &HeaderMap, q: &HashMap<String, String>) -> bool {
        let key = headers.get("X-MBX-APIKEY").and_then(|v| v.to_str().ok());
        key == Some(API_KEY) && q.contains_key("timestamp") && q.contains_key("signature")
    }

    async fn ping(State(m): State<Arc<MockExchange>>) -> Json<Value> {
        m.record("/api/v3/ping", HashMap::new());
        Json(json!({}))
    }

    async fn account(
        State(m): State<Arc<MockExchange>>,
        headers: HeaderMap,
        Query(q): Query<HashMap<String, String>>,
    ) -> Response {
        let ok = signed(&headers, &q);
        m.record("/api/v3/account", q);
        if !ok {
            return api_error(StatusCode::UNAUTHORIZED, -2015, "Invalid API-key, IP, or permissions for action.");
        }
        Json(json!({"canTrade": true, "balances": []})).into_response()
    }

    async fn exchange_info(
        State(m): State<Arc<MockExchange>>,
        Query(q): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        let symbol = q.get("symbol").cloned().unwrap_or_default();
        m.record("/api/v3/exchangeInfo", q);
        let step = if symbol == "BTCUSDT" { "0.01000000" } else { "0.00100000" };
        Json(exchange_info_body(&symbol, step))
    }

    async fn ticker(
        State(m): State<Arc<MockExchange>>,
        Query(q): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        let symbol = q.get("symbol").cloned().unwrap_or_default();
        m.record("/api/v3/ticker/price", q);
        Json(json!({"symbol": symbol, "price": "34567.89000000"}))
    }

    async fn order_test(
        State(m): State<Arc<MockExchange>>,
        headers: HeaderMap,
        Query(q): Query<HashMap<String, String>>,
    ) -> Response {
        let ok = signed(&headers, &q);
        m.record("/api/v3/order/test", q);
        if !ok {
            return api_error(StatusCode::UNAUTHORIZED, -2015, "Invalid API-key");
        }
        Json(json!({})).into_response()
    }

    async fn order(
        State(m): State<Arc<MockExchange>>,
        headers: HeaderMap,
        Query(q): Query<HashMap<String, String>>,
    ) -> Response {
        let ok = signed(&headers, &q);
        let symbol = q.get("symbol").cloned().unwrap_or_default();
        let kind = q.get("type").cloned().unwrap_or_default();
        m.record("/api/v3/order", q);

        if !ok {
            return api_error(StatusCode::UNAUTHORIZED, -2015, "Invalid API-key");
        }
        if symbol == "FAILUSDT" {
            return api_error(
                StatusCode::BAD_REQUEST,
                -2010,
                "Account has insufficient balance for requested action.",
            );
        }
        let body = match (kind.as_str(), symbol.as_str()) {
            // Accepted but not filled yet: no fills in the answer
            ("MARKET", "ETHUSDT") => json!({"orderId": 9002, "status": "NEW"}),
            ("MARKET", _) => json!({
                "orderId": 9001,
                "status": "FILLED",
                "executedQty": "0.01000000",
                "cummulativeQuoteQty": "650.00000000",
                "fills": [{"price": "65000.00000000", "qty": "0.01000000"}]
            }),
            _ => json!({"orderId": 9003, "status": "NEW"}),
        };
        Json(body).into_response()
    }

    async fn order_oco(
        State(m): State<Arc<MockExchange>>,
        headers: HeaderMap,
        Query(q): Query<HashMap<String, String>>,
    ) -> Response {
        let ok = signed(&headers, &q);
        m.record("/api/v3/order/oco", q);
        if !ok {
            return api_error(StatusCode::UNAUTHORIZED, -2015, "Invalid API-key");
        }
        Json(json!({"orderListId": 55, "orders": [{"orderId": 701}, {"orderId": 702}]})).into_response()
    }

    async fn spawn_mock() -> (String, Arc<MockExchange>) {
        let mock = Arc::new(MockExchange::default());
        let app = Router::new()
            .route("/api/v3/ping", get(ping))
            .route("/api/v3/account", get(account))
            .route("/api/v3/exchangeInfo", get(exchange_info))
            .route("/api/v3/ticker/price", get(ticker))
            .route("/api/v3/order/test", post(order_test))
            .route("/api/v3/order", post(order))
            .route("/api/v3/order/oco", post(order_oco))
            .with_state(mock.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), mock)
    }

    fn client(base_url: &str, api_key: &str, connection: ConnectionState) -> BinanceClient {
        let config = BinanceConfig {
            api_key: api_key.to_string(),
            secret_key: "mock-secret".to_string(),
            base_url: base_url.to_string(),
            recv_window_ms: 5000,
        };
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        ));
        BinanceClient::new(&config, connection, clock).unwrap()
    }

    #[tokio::test]
    async fn test_connect_pings_and_verifies_key() {
        let (base, mock) = spawn_mock().await;
        let binance = client(&base, API_KEY, ConnectionState::new());

        let status = binance.connect().await.unwrap();

        assert_eq!(status, ConnectionStatus::Connected);
        assert_eq!(mock.hits_on("/api/v3/ping").len(), 1);
        let account = mock.hits_on("/api/v3/account");
        assert_eq!(account.len(), 1);
        assert_eq!(account[0].get("recvWindow").map(String::as_str), Some("5000"));
    }

    #[tokio::test]
    async fn test_connect_with_bad_key_stays_disconnected() {
        let (base, _mock) = spawn_mock().await;
        let connection = ConnectionState::new();
        let binance = client(&base, "bad-key", connection.clone());

        let err = binance.connect().await.unwrap_err();

        assert!(err.message.contains("-2015"), "message = {}", err.message);
        assert_eq!(connection.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_test_market_order_uses_test_endpoint_and_ticker() {
        let (base, mock) = spawn_mock().await;
        let binance = client(&base, API_KEY, ConnectionState::connected());
        let mut req = request(OrderKind::Market, true);
        req.quantity = dec!(0.015);

        let result = binance.submit(req).await.unwrap();

        assert_eq!(result.status, OrderStatus::Filled);
        assert_eq!(result.executed_price, Some(dec!(34567.89)));
        // Floored to the 0.01 BTCUSDT lot step before signing
        assert_eq!(result.quantity, dec!(0.01));
        let sent = mock.hits_on("/api/v3/order/test");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].get("quantity").map(String::as_str), Some("0.01"));
        assert!(mock.hits_on("/api/v3/order").is_empty());
    }

    #[tokio::test]
    async fn test_live_market_order_uses_fill_average() {
        let (base, mock) = spawn_mock().await;
        let binance = client(&base, API_KEY, ConnectionState::connected());
        let mut req = request(OrderKind::Market, false);
        req.quantity = dec!(0.01);

        let result = binance.submit(req).await.unwrap();

        assert_eq!(result.order_id, 9001);
        assert_eq!(result.status, OrderStatus::New);
        assert_eq!(result.executed_price, Some(dec!(65000)));
        assert!(mock.hits_on("/api/v3/ticker/price").is_empty());
    }

    #[tokio::test]
    async fn test_live_market_order_without_fills_falls_back_to_ticker() {
        let (base, mock) = spawn_mock().await;
        let binance = client(&base, API_KEY, ConnectionState::connected());
        let mut req = request(OrderKind::Market, false);
        req.symbol = "ETHUSDT".to_string();

        let result = binance.submit(req).await.unwrap();

        assert_eq!(result.order_id, 9002);
        assert_eq!(result.executed_price, Some(dec!(34567.89)));
        assert_eq!(mock.hits_on("/api/v3/ticker/price").len(), 1);
    }

    #[tokio::test]
    async fn test_live_limit_order_is_new_and_echoes_price() {
        let (base, mock) = spawn_mock().await;
        let binance = client(&base, API_KEY, ConnectionState::connected());
        let mut req = request(OrderKind::Limit, false);
        req.quantity = dec!(0.02);
        req.price = Some(dec!(60000.50));

        let result = binance.submit(req).await.unwrap();

        assert_eq!(result.order_id, 9003);
        assert_eq!(result.status, OrderStatus::New);
        assert_eq!(result.price, Some(dec!(60000.50)));
        let sent = mock.hits_on("/api/v3/order");
        assert_eq!(sent[0].get("type").map(String::as_str), Some("LIMIT"));
        assert_eq!(sent[0].get("timeInForce").map(String::as_str), Some("GTC"));
    }

    #[tokio::test]
    async fn test_exchange_rejection_becomes_execution_failure() {
        let (base, _mock) = spawn_mock().await;
        let binance = client(&base, API_KEY, ConnectionState::connected());
        let mut req = request(OrderKind::Market, false);
        req.symbol = "FAILUSDT".to_string();

        let err = binance.submit(req).await.unwrap_err();

        assert!(err.message.contains("-2010"), "message = {}", err.message);
        assert!(err.message.contains("insufficient balance"));
    }

    #[tokio::test]
    async fn test_quantity_below_lot_step_is_not_sent() {
        let (base, mock) = spawn_mock().await;
        let binance = client(&base, API_KEY, ConnectionState::connected());
        let mut req = request(OrderKind::Market, false);
        req.quantity = dec!(0.005);

        let err = binance.submit(req).await.unwrap_err();

        assert!(err.message.contains("lot step"), "message = {}", err.message);
        assert!(mock.hits_on("/api/v3/order").is_empty());
    }

    #[tokio::test]
    async fn test_lot_step_is_fetched_once_per_symbol() {
        let (base, mock) = spawn_mock().await;
        let binance = client(&base, API_KEY, ConnectionState::connected());

        for _ in 0..3 {
            let mut req = request(OrderKind::Market, true);
            req.quantity = dec!(0.02);
            binance.submit(req).await.unwrap();
        }

        assert_eq!(mock.hits_on("/api/v3/exchangeInfo").len(), 1);
        assert_eq!(mock.hits_on("/api/v3/order/test").len(), 3);
    }

    #[tokio::test]
    async fn test_live_oco_order_maps_ids() {
        let (base, mock) = spawn_mock().await;
        let binance = client(&base, API_KEY, ConnectionState::connected());
        let mut req = request(OrderKind::Oco, false);
        req.side = Side::Sell;
        req.quantity = dec!(0.02);
        req.price = Some(dec!(70000));
        req.stop_price = Some(dec!(60000));
        req.stop_limit_price = Some(dec!(59900));

        let result = binance.submit(req).await.unwrap();

        assert_eq!(result.order_id, 701);
        assert_eq!(result.order_list_id, Some(55));
        assert_eq!(result.status, OrderStatus::New);
        assert_eq!(result.stop_limit_price, Some(dec!(59900)));
        assert_eq!(mock.hits_on("/api/v3/order/oco").len(), 1);
    }

    #[tokio::test]
    async fn test_test_oco_order_never_reaches_exchange() {
        let (base, mock) = spawn_mock().await;
        let binance = client(&base, API_KEY, ConnectionState::connected());
        let mut req = request(OrderKind::Oco, true);
        req.price = Some(dec!(70000));
        req.stop_price = Some(dec!(60000));
        req.stop_limit_price = Some(dec!(59900));

        let result = binance.submit(req).await.unwrap();

        assert_eq!(result.status, OrderStatus::Filled);
        let list_id = result.order_list_id.unwrap();
        assert_ne!(list_id, result.order_id);
        assert!(mock.hits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_while_disconnected_sends_nothing() {
        let (base, mock) = spawn_mock().await;
        let binance = client(&base, API_KEY, ConnectionState::new());

        let err = binance.submit(request(OrderKind::Market, true)).await.unwrap_err();

        assert_eq!(err.message, "not connected");
        assert!(mock.hits.lock().unwrap().is_empty());
    }
}
