//! Synthetic execution backend.
//!
//! Stands in for a real exchange: every submission waits out a fake latency,
//! then either fails with a canned error or answers with a made-up result.
//! Randomness comes from a seedable RNG and time from an injected clock, so
//! a seeded simulator on a [`ManualClock`](crate::clock::ManualClock) is
//! fully deterministic.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::SimulatorConfig;
use crate::connection::{ConnectionState, ConnectionStatus};
use crate::constants::simulator::{FAILURE_MESSAGE, ORDER_ID_SEED_BOUND};
use crate::error::ExecutionFailure;

use super::{
    traits::{required_price, ExecutionClient, ExecutionResult},
    types::{OrderKind, OrderRequest, OrderResult, OrderStatus},
};

pub struct ResponseSimulator {
    config: SimulatorConfig,
    connection: ConnectionState,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    next_id: AtomicU64,
}

impl ResponseSimulator {
    pub fn new(config: SimulatorConfig, connection: ConnectionState, clock: Arc<dyn Clock>) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let first_id = rng.gen_range(1..ORDER_ID_SEED_BOUND);

        Self {
            config,
            connection,
            clock,
            rng: Mutex::new(rng),
            next_id: AtomicU64::new(first_id),
        }
    }

    fn latency(&self) -> Duration {
        Duration::from_millis(self.config.latency_ms)
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn roll_failure(&self) -> bool {
        let p = self.config.failure_probability.clamp(0.0, 1.0);
        self.rng.lock().unwrap().gen_bool(p)
    }

    /// Uniform in [fill_price_min, fill_price_max), whole cents. A band
    /// that cannot be drawn in cents pins the fill to `fill_price_min`.
    fn synthetic_fill_price(&self) -> Decimal {
        match (
            to_cents(self.config.fill_price_min),
            to_cents(self.config.fill_price_max),
        ) {
            (Some(min_cents), Some(max_cents)) if min_cents >= 1 && max_cents > min_cents => {
                let cents = self.rng.lock().unwrap().gen_range(min_cents..max_cents);
                Decimal::new(cents, 2)
            }
            _ => self.config.fill_price_min,
        }
    }

    /// Shared tail of every submission: latency, failure roll, base result.
    async fn respond(&self, request: &OrderRequest) -> ExecutionResult<OrderResult> {
        self.clock.sleep(self.latency()).await;

        if self.roll_failure() {
            warn!(
                "❌ [SIM] Rejecting {} {} {} {}: {}",
                request.kind, request.side, request.quantity, request.symbol, FAILURE_MESSAGE
            );
            return Err(ExecutionFailure::new(FAILURE_MESSAGE));
        }

        let result = OrderResult {
            order_id: self.allocate_id(),
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
            timestamp: self.clock.now(),
        };
        debug!("[SIM] Allocated order id {} for {}", result.order_id, request.symbol);
        Ok(result)
    }
}

/// Whole cents, or `None` when the price does not fit in an i64 cent count
pub(crate) fn to_cents(price: Decimal) -> Option<i64> {
    price.checked_mul(Decimal::ONE_HUNDRED)?.trunc().to_i64()
}

#[async_trait]
impl ExecutionClient for ResponseSimulator {
    fn name(&self) -> &'static str {
        "simulator"
    }

    fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    async fn connect(&self) -> ExecutionResult<ConnectionStatus> {
        let delay = Duration::from_millis(self.config.connect_latency_ms);
        let clock = self.clock.clone();
        self.connection
            .connect_with(self.name(), || async move {
                clock.sleep(delay).await;
                info!("🔑 [SIM] API key verified and session initialized");
                Ok::<(), ExecutionFailure>(())
            })
            .await
    }

    async fn submit_market_order(&self, request: OrderRequest) -> ExecutionResult<OrderResult> {
        let mut result = self.respond(&request).await?;
        result.executed_price = Some(self.synthetic_fill_price());
        Ok(result)
    }

    async fn submit_limit_order(&self, request: OrderRequest) -> ExecutionResult<OrderResult> {
        let price = required_price(request.price, "price", OrderKind::Limit)?;
        let mut result = self.respond(&request).await?;
        result.price = Some(price);
        Ok(result)
    }

    async fn submit_oco_order(&self, request: OrderRequest) -> ExecutionResult<OrderResult> {
        let price = required_price(request.price, "price", OrderKind::Oco)?;
        let stop_price = required_price(request.stop_price, "stopPrice", OrderKind::Oco)?;
        let stop_limit_price =
            required_price(request.stop_limit_price, "stopLimitPrice", OrderKind::Oco)?;

        let mut result = self.respond(&request).await?;
        result.order_list_id = Some(self.allocate_id());
        result.price = Some(price);
        result.stop_price = Some(stop_price);
        result.stop_limit_price = Some(stop_limit_price);
        Ok(result)
    }
}
