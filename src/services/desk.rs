//! The order submission pipeline.
//!
//! raw fields -> builder (normalize + validate) -> execution client, bounded
//! by the submit timeout -> presenter -> result log.
//!
//! Submissions share nothing mutable except the append-only log, so any
//! number of them may run at once; the log then fills in completion order.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::connection::ConnectionStatus;
use crate::constants::events;
use crate::error::{ExecutionFailure, OrderError, ValidationError};
use crate::exchange::traits::ExecutionClient;
use crate::exchange::types::{ExecutionOutcome, OrderKind, OrderRequest, OrderResult};

use super::order_builder::{OrderBuilder, RawOrderFields};
use super::presenter::{DisplayRecord, ResultLog, ResultPresenter};
use super::validation::OrderRules;

#[derive(Clone)]
pub struct OrderDesk {
    client: Arc<dyn ExecutionClient>,
    builder: OrderBuilder,
    presenter: ResultPresenter,
    log: ResultLog,
    submit_timeout: Duration,
}

impl OrderDesk {
    pub fn new(
        client: Arc<dyn ExecutionClient>,
        builder: OrderBuilder,
        presenter: ResultPresenter,
        submit_timeout: Duration,
    ) -> Self {
        Self {
            client,
            builder,
            presenter,
            log: ResultLog::new(),
            submit_timeout,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        client: Arc<dyn ExecutionClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(
            client,
            OrderBuilder::new(OrderRules::from(&config.orders)),
            ResultPresenter::new(clock),
            config.execution.submit_timeout(),
        )
    }

    pub fn client(&self) -> &Arc<dyn ExecutionClient> {
        &self.client
    }

    pub fn log(&self) -> &ResultLog {
        &self.log
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.client.connection().status()
    }

    pub async fn connect(&self) -> Result<ConnectionStatus, ExecutionFailure> {
        self.client.connect().await
    }

    /// One submission against the backend, mapped to `ExecutionFailure("timeout")`
    /// when it outlives the submit timeout.
    pub async fn submit(&self, request: OrderRequest) -> ExecutionOutcome {
        let kind = request.kind;
        let symbol = request.symbol.clone();

        info!(
            event = events::ORDER_SUBMITTED,
            backend = self.client.name(),
            "📤 [ORDER] Submitting {}{} order: {} {} {}",
            if request.is_test { "TEST " } else { "" },
            kind,
            request.side,
            request.quantity,
            symbol
        );

        match tokio::time::timeout(self.submit_timeout, self.client.submit(request)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    event = events::ORDER_TIMEOUT,
                    "⏱️ [ORDER] {} {} timed out after {:?}", kind, symbol, self.submit_timeout
                );
                Err(ExecutionFailure::timeout())
            }
        }
    }

    /// Build and submit without touching the log
    pub async fn execute(
        &self,
        kind: OrderKind,
        fields: &RawOrderFields,
    ) -> Result<OrderResult, OrderError> {
        let request = self.builder.build(kind, fields)?;
        Ok(self.submit(request).await?)
    }

    /// Full pipeline: every outcome, including validation errors, ends up
    /// as a record in the log.
    pub async fn place(&self, kind: OrderKind, fields: RawOrderFields) -> DisplayRecord {
        let is_test = fields.test;

        let request = match self.builder.build(kind, &fields) {
            Ok(request) => request,
            Err(e) => return self.reject(kind, &e, is_test),
        };

        let outcome = self.submit(request).await;
        match &outcome {
            Ok(result) => info!(
                event = events::ORDER_PLACED,
                order_id = result.order_id,
                "✅ [ORDER] Order {} placed ({} {})",
                result.order_id,
                result.kind,
                result.status
            ),
            Err(failure) => error!(
                event = events::ORDER_FAILED,
                "❌ [ORDER] {} order failed: {}", kind, failure
            ),
        }

        let record = self.presenter.present(&outcome, is_test);
        self.log.append(record.clone());
        record
    }

    /// Record an order that never reached the backend
    pub fn reject(&self, kind: OrderKind, error: &ValidationError, is_test: bool) -> DisplayRecord {
        warn!(
            event = events::ORDER_REJECTED,
            "⚠️ [ORDER] {} order rejected before submission: {}", kind, error
        );
        let record = self.presenter.present_rejection(error, is_test);
        self.log.append(record.clone());
        record
    }

    pub async fn place_market_order(&self, fields: RawOrderFields) -> DisplayRecord {
        self.place(OrderKind::Market, fields).await
    }

    pub async fn place_limit_order(&self, fields: RawOrderFields) -> DisplayRecord {
        self.place(OrderKind::Limit, fields).await
    }

    pub async fn place_oco_order(&self, fields: RawOrderFields) -> DisplayRecord {
        self.place(OrderKind::Oco, fields).await
    }
}
