//! Binance Spot adapter (signed REST).
//!
//! Live MARKET/LIMIT orders go to `POST /api/v3/order`; test orders go to
//! `/api/v3/order/test`, which validates and discards, so their ids are
//! allocated locally. Binance has no test endpoint for OCO, so test OCO
//! orders never leave the process.
//!
//! Quantities are floored to the symbol's `LOT_SIZE` step from
//! `/api/v3/exchangeInfo` before signing; steps are cached per symbol.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use std::sync::atomic::{AtomicU64, Ordering};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{
    traits::{required_price, ExecutionClient, ExecutionResult},
    types::{OrderKind, OrderRequest, OrderResult, OrderStatus},
};

use crate::clock::Clock;
use crate::config::BinanceConfig;
use crate::connection::{ConnectionState, ConnectionStatus};
use crate::constants::binance::{
    ACCOUNT_PATH, API_KEY_HEADER, EXCHANGE_INFO_PATH, OCO_ORDER_PATH, ORDER_PATH, PING_PATH,
    TEST_ORDER_PATH, TICKER_PRICE_PATH,
};
use crate::error::{ExchangeError, ExecutionFailure};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrderResponse {
    pub order_id: u64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub executed_qty: Option<Decimal>,
    #[serde(default)]
    pub cummulative_quote_qty: Option<Decimal>,
    #[serde(default)]
    pub fills: Vec<Fill>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Fill {
    pub price: Decimal,
    pub qty: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OcoResponse {
    pub order_list_id: u64,
    pub orders: Vec<OcoLeg>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OcoLeg {
    pub order_id: u64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SymbolInfo {
    pub symbol: String,
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "filterType")]
pub(crate) enum SymbolFilter {
    #[serde(rename = "LOT_SIZE")]
    LotSize {
        #[serde(rename = "stepSize")]
        step_size: Decimal,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: Decimal,
}

pub struct BinanceClient {
    client: Client,
    base_url: Url,
    api_key: String,
    api_secret: String,
    recv_window_ms: u64,
    connection: ConnectionState,
    clock: Arc<dyn Clock>,
    next_local_id: AtomicU64,
    lot_steps: Mutex<HashMap<String, Decimal>>,
}

impl BinanceClient {
    pub fn new(
        config: &BinanceConfig,
        connection: ConnectionState,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ExchangeError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        let first_local_id = clock.now().timestamp_millis().max(1) as u64;

        Ok(Self {
            client,
            base_url: Url::parse(&config.base_url)?,
            api_key: config.api_key.clone(),
            api_secret: config.secret_key.clone(),
            recv_window_ms: config.recv_window_ms,
            connection,
            clock,
            next_local_id: AtomicU64::new(first_local_id),
            lot_steps: Mutex::new(HashMap::new()),
        })
    }

    fn allocate_local_id(&self) -> u64 {
        self.next_local_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn send_public(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<String, ExchangeError> {
        let mut url = self.base_url.join(path)?;
        if !params.is_empty() {
            url.set_query(Some(&encode_query(params)));
        }
        let resp = self.client.get(url).send().await?;
        read_body(resp).await
    }

    async fn send_signed(
        &self,
        method: Method,
        path: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<String, ExchangeError> {
        params.push(("recvWindow", self.recv_window_ms.to_string()));
        params.push(("timestamp", self.clock.now().timestamp_millis().to_string()));

        let mut query = encode_query(&params);
        append_signature(&self.api_secret, &mut query)?;

        let mut url = self.base_url.join(path)?;
        url.set_query(Some(&query));

        debug!("[BINANCE] {} {}", method, path);
        let resp = self
            .client
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        read_body(resp).await
    }

    async fn ticker_price(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        let body = self
            .send_public(TICKER_PRICE_PATH, &[("symbol", symbol.to_string())])
            .await?;
        let ticker: TickerPrice = serde_json::from_str(&body)?;
        Ok(ticker.price)
    }

    async fn lot_step(&self, symbol: &str) -> Result<Option<Decimal>, ExchangeError> {
        let cached = self.lot_steps.lock().unwrap().get(symbol).copied();
        if cached.is_some() {
            return Ok(cached);
        }

        let body = self
            .send_public(EXCHANGE_INFO_PATH, &[("symbol", symbol.to_string())])
            .await?;
        let info: ExchangeInfo = serde_json::from_str(&body)?;
        let step = lot_step_from(&info, symbol);

        match step {
            Some(step) => {
                debug!("[BINANCE] {} lot step {}", symbol, step);
                self.lot_steps.lock().unwrap().insert(symbol.to_string(), step);
            }
            None => warn!("⚠️ [BINANCE] No LOT_SIZE filter for {}, sending quantity as is", symbol),
        }
        Ok(step)
    }

    /// Copy of `request` with the quantity floored to the symbol's lot step
    async fn fit_to_lot_step(&self, request: &OrderRequest) -> Result<OrderRequest, ExchangeError> {
        let mut fitted = request.clone();
        if let Some(step) = self.lot_step(&request.symbol).await? {
            fitted.quantity = floor_to_step(request.quantity, step);
            if fitted.quantity <= Decimal::ZERO {
                return Err(ExchangeError::BelowLotStep {
                    symbol: request.symbol.clone(),
                    quantity: request.quantity,
                    step,
                });
            }
        }
        Ok(fitted)
    }

    /// Validated by the exchange, then answered locally
    async fn submit_test_order(&self, request: &OrderRequest) -> Result<OrderResult, ExchangeError> {
        let request = &self.fit_to_lot_step(request).await?;
        let params = order_params(request, &new_client_order_id())?;
        self.send_signed(Method::POST, TEST_ORDER_PATH, params).await?;
        Ok(local_result(request, self.allocate_local_id(), self.clock.now()))
    }

    async fn submit_live_order(
        &self,
        request: &OrderRequest,
    ) -> Result<(OrderResult, OrderResponse), ExchangeError> {
        let request = &self.fit_to_lot_step(request).await?;
        let params = order_params(request, &new_client_order_id())?;
        let body = self.send_signed(Method::POST, ORDER_PATH, params).await?;
        let resp: OrderResponse = serde_json::from_str(&body)?;
        debug!(
            "[BINANCE] Order {} acknowledged with exchange status {:?}",
            resp.order_id, resp.status
        );
        Ok((local_result(request, resp.order_id, self.clock.now()), resp))
    }
}

#[async_trait]
impl ExecutionClient for BinanceClient {
    fn name(&self) -> &'static str {
        "binance"
    }

    fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    async fn connect(&self) -> ExecutionResult<ConnectionStatus> {
        self.connection
            .connect_with(self.name(), || async {
                self.send_public(PING_PATH, &[]).await?;
                // A signed read proves the key pair before any order is sent
                self.send_signed(Method::GET, ACCOUNT_PATH, Vec::new()).await?;
                info!("🔑 [BINANCE] API key verified");
                Ok::<(), ExecutionFailure>(())
            })
            .await
    }

    async fn submit_market_order(&self, request: OrderRequest) -> ExecutionResult<OrderResult> {
        if request.is_test {
            let mut result = self.submit_test_order(&request).await?;
            result.executed_price = Some(self.ticker_price(&request.symbol).await?);
            return Ok(result);
        }

        let (mut result, resp) = self.submit_live_order(&request).await?;
        result.executed_price = match average_fill_price(&resp) {
            Some(price) => Some(price),
            None => Some(self.ticker_price(&request.symbol).await?),
        };
        Ok(result)
    }

    async fn submit_limit_order(&self, request: OrderRequest) -> ExecutionResult<OrderResult> {
        let price = required_price(request.price, "price", OrderKind::Limit)?;
        let mut result = if request.is_test {
            self.submit_test_order(&request).await?
        } else {
            self.submit_live_order(&request).await?.0
        };
        result.price = Some(price);
        Ok(result)
    }

    async fn submit_oco_order(&self, request: OrderRequest) -> ExecutionResult<OrderResult> {
        let price = required_price(request.price, "price", OrderKind::Oco)?;
        let stop_price = required_price(request.stop_price, "stopPrice", OrderKind::Oco)?;
        let stop_limit_price =
            required_price(request.stop_limit_price, "stopLimitPrice", OrderKind::Oco)?;

        let (request, order_id, order_list_id) = if request.is_test {
            let order_id = self.allocate_local_id();
            (request, order_id, self.allocate_local_id())
        } else {
            let request = self.fit_to_lot_step(&request).await?;
            let params = order_params(&request, &new_client_order_id())?;
            let body = self.send_signed(Method::POST, OCO_ORDER_PATH, params).await?;
            let resp: OcoResponse = serde_json::from_str(&body).map_err(ExchangeError::from)?;
            let (order_id, order_list_id) = oco_ids(&resp)?;
            (request, order_id, order_list_id)
        };

        let mut result = local_result(&request, order_id, self.clock.now());
        result.order_list_id = Some(order_list_id);
        result.price = Some(price);
        result.stop_price = Some(stop_price);
        result.stop_limit_price = Some(stop_limit_price);
        Ok(result)
    }
}

async fn read_body(resp: reqwest::Response) -> Result<String, ExchangeError> {
    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        return Err(parse_api_error(status.as_u16(), &text));
    }
    Ok(text)
}

fn new_client_order_id() -> String {
    format!("desk-{}", uuid::Uuid::new_v4().simple())
}

/// Result skeleton shared by every kind; status follows the test flag
pub(crate) fn local_result(
    request: &OrderRequest,
    order_id: u64,
    timestamp: chrono::DateTime<chrono::Utc>,
) -> OrderResult {
    OrderResult {
        order_id,
        order_list_id: None,
        status: OrderStatus::for_submission(request.is_test),
        kind: request.kind,
        symbol: request.symbol.clone(),
        side: request.side,
        quantity: request.quantity,
        price: None,
        stop_price: None,
        stop_limit_price: None,
        executed_price: None,
        timestamp,
    }
}

/// Request parameters for the order endpoints, before timestamp and signature
pub(crate) fn order_params(
    request: &OrderRequest,
    client_order_id: &str,
) -> Result<Vec<(&'static str, String)>, ExchangeError> {
    let missing = |field: &str| {
        ExchangeError::UnexpectedResponse(format!("{} order requires {}", request.kind, field))
    };

    let mut params = vec![
        ("symbol", request.symbol.clone()),
        ("side", request.side.to_string()),
        ("quantity", request.quantity.to_string()),
    ];

    match request.kind {
        OrderKind::Market => {
            params.push(("type", "MARKET".to_string()));
            params.push(("newClientOrderId", client_order_id.to_string()));
            params.push(("newOrderRespType", "FULL".to_string()));
        }
        OrderKind::Limit => {
            let price = request.price.ok_or_else(|| missing("price"))?;
            params.push(("type", "LIMIT".to_string()));
            params.push(("timeInForce", "GTC".to_string()));
            params.push(("price", price.to_string()));
            params.push(("newClientOrderId", client_order_id.to_string()));
        }
        OrderKind::Oco => {
            let price = request.price.ok_or_else(|| missing("price"))?;
            let stop = request.stop_price.ok_or_else(|| missing("stopPrice"))?;
            let stop_limit = request.stop_limit_price.ok_or_else(|| missing("stopLimitPrice"))?;
            params.push(("price", price.to_string()));
            params.push(("stopPrice", stop.to_string()));
            params.push(("stopLimitPrice", stop_limit.to_string()));
            params.push(("stopLimitTimeInForce", "GTC".to_string()));
            params.push(("listClientOrderId", client_order_id.to_string()));
        }
    }

    Ok(params)
}

pub(crate) fn lot_step_from(info: &ExchangeInfo, symbol: &str) -> Option<Decimal> {
    info.symbols
        .iter()
        .filter(|s| s.symbol == symbol)
        .flat_map(|s| s.filters.iter())
        .find_map(|f| match f {
            SymbolFilter::LotSize { step_size } if *step_size > Decimal::ZERO => Some(*step_size),
            _ => None,
        })
}

/// Largest multiple of `step` not above `quantity`
pub(crate) fn floor_to_step(quantity: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return quantity;
    }
    ((quantity / step).floor() * step).normalize()
}

pub(crate) fn encode_query(params: &[(&str, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
        .finish()
}

pub(crate) fn signature_hex(secret: &str, payload: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::Signature(e.to_string()))?;
    mac.update(payload.as_bytes());
    let digest = mac.finalize().into_bytes();

    let mut signature = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        signature.push_str(&format!("{:02x}", byte));
    }
    Ok(signature)
}

fn append_signature(secret: &str, query: &mut String) -> Result<(), ExchangeError> {
    let signature = signature_hex(secret, query)?;
    query.push_str("&signature=");
    query.push_str(&signature);
    Ok(())
}

pub(crate) fn parse_api_error(status: u16, body: &str) -> ExchangeError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(err) => ExchangeError::Api {
            code: err.code,
            msg: err.msg,
        },
        Err(_) => ExchangeError::Http {
            status,
            body: body.to_string(),
        },
    }
}

/// Quantity-weighted fill price, falling back to quote/base totals
pub(crate) fn average_fill_price(resp: &OrderResponse) -> Option<Decimal> {
    let filled: Decimal = resp.fills.iter().map(|f| f.qty).sum();
    if filled > Decimal::ZERO {
        let notional: Decimal = resp.fills.iter().map(|f| f.price * f.qty).sum();
        return Some((notional / filled).round_dp(8));
    }

    match (resp.cummulative_quote_qty, resp.executed_qty) {
        (Some(quote), Some(base)) if base > Decimal::ZERO && quote > Decimal::ZERO => {
            Some((quote / base).round_dp(8))
        }
        _ => None,
    }
}

/// (order id, order list id); the first leg stands for the pair
pub(crate) fn oco_ids(resp: &OcoResponse) -> Result<(u64, u64), ExchangeError> {
    let leg = resp.orders.first().ok_or_else(|| {
        ExchangeError::UnexpectedResponse(format!("order list {} has no orders", resp.order_list_id))
    })?;
    Ok((leg.order_id, resp.order_list_id))
}
