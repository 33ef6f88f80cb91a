use async_trait::async_trait;

use crate::connection::{ConnectionState, ConnectionStatus};
use crate::error::ExecutionFailure;

use super::types::{OrderKind, OrderRequest, OrderResult};

pub type ExecutionResult<T> = Result<T, ExecutionFailure>;

/// An order-execution backend: the simulator, or a real exchange.
///
/// Implementors provide the three per-kind operations; callers go through
/// [`ExecutionClient::submit`], which refuses work while disconnected and
/// dispatches on the order kind.
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    fn name(&self) -> &'static str;

    /// State injected at construction time
    fn connection(&self) -> &ConnectionState;

    async fn connect(&self) -> ExecutionResult<ConnectionStatus>;

    async fn submit_market_order(&self, request: OrderRequest) -> ExecutionResult<OrderResult>;
    async fn submit_limit_order(&self, request: OrderRequest) -> ExecutionResult<OrderResult>;
    async fn submit_oco_order(&self, request: OrderRequest) -> ExecutionResult<OrderResult>;

    async fn submit(&self, request: OrderRequest) -> ExecutionResult<OrderResult> {
        if !self.connection().is_connected() {
            return Err(ExecutionFailure::not_connected());
        }
        match request.kind {
            OrderKind::Market => self.submit_market_order(request).await,
            OrderKind::Limit => self.submit_limit_order(request).await,
            OrderKind::Oco => self.submit_oco_order(request).await,
        }
    }
}

/// Price a backend cannot do without. The builder guarantees presence, this
/// only guards direct callers.
pub(crate) fn required_price(
    value: Option<rust_decimal::Decimal>,
    field: &str,
    kind: OrderKind,
) -> ExecutionResult<rust_decimal::Decimal> {
    value.ok_or_else(|| ExecutionFailure::new(format!("{} order requires {}", kind, field)))
}
