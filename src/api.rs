use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::error::ValidationError;
use crate::exchange::types::OrderKind;
use crate::services::desk::OrderDesk;
use crate::services::order_builder::RawOrderFields;
use crate::services::presenter::{DisplayOutcome, DisplayRecord};

pub struct AppState {
    pub desk: OrderDesk,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/connect", post(connect))
        .route("/status", get(status))
        .route("/market-order", post(market_order))
        .route("/limit-order", post(limit_order))
        .route("/oco-order", post(oco_order))
        .route("/results", get(results))
        .with_state(state)
}

pub async fn run_server(state: Arc<AppState>, bind_addr: &str) -> std::io::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("🌐 API Server listening on {}", bind_addr);
    axum::serve(listener, app).await
}

/// Order form as posted by a client. Numbers may arrive as JSON numbers or
/// strings; both are handed to the builder as text.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderForm {
    pub symbol: Option<Value>,
    pub side: Option<Value>,
    pub quantity: Option<Value>,
    pub price: Option<Value>,
    pub stop_price: Option<Value>,
    pub stop_limit_price: Option<Value>,
    #[serde(default)]
    pub test: bool,
}

fn field_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

impl From<OrderForm> for RawOrderFields {
    fn from(form: OrderForm) -> Self {
        RawOrderFields {
            symbol: field_text(form.symbol),
            side: field_text(form.side),
            quantity: field_text(form.quantity),
            price: field_text(form.price),
            stop_price: field_text(form.stop_price),
            stop_limit_price: field_text(form.stop_limit_price),
            test: form.test,
        }
    }
}

fn status_for(record: &DisplayRecord) -> StatusCode {
    match record.outcome {
        DisplayOutcome::Placed { .. } => StatusCode::OK,
        DisplayOutcome::Rejected { .. } => StatusCode::BAD_REQUEST,
        DisplayOutcome::Failed { .. } => StatusCode::BAD_GATEWAY,
    }
}

async fn place(
    state: &AppState,
    kind: OrderKind,
    payload: Result<Json<OrderForm>, JsonRejection>,
) -> impl IntoResponse {
    let record = match payload {
        Ok(Json(form)) => state.desk.place(kind, form.into()).await,
        // The test flag is unknown for an unreadable body; treat it as live
        Err(rejection) => {
            let error = ValidationError::MalformedRequest {
                reason: rejection.body_text(),
            };
            state.desk.reject(kind, &error, false)
        }
    };
    (status_for(&record), Json(record))
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn connect(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.desk.connect().await {
        Ok(status) => (StatusCode::OK, Json(json!({"status": status}))).into_response(),
        Err(e) => {
            error!("❌ [API] Connect failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "status": state.desk.connection_status(),
                    "error": e.message,
                })),
            )
                .into_response()
        }
    }
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": state.desk.connection_status(),
        "backend": state.desk.client().name(),
    }))
}

async fn market_order(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<OrderForm>, JsonRejection>,
) -> impl IntoResponse {
    place(&state, OrderKind::Market, payload).await
}

async fn limit_order(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<OrderForm>, JsonRejection>,
) -> impl IntoResponse {
    place(&state, OrderKind::Limit, payload).await
}

async fn oco_order(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<OrderForm>, JsonRejection>,
) -> impl IntoResponse {
    place(&state, OrderKind::Oco, payload).await
}

async fn results(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.desk.log().newest_first())
}
