use std::sync::Arc;
use tracing::info;

use crate::{
    clock::Clock,
    config::{AppConfig, Backend},
    connection::ConnectionState,
    error::ConfigError,
};

use super::{binance::BinanceClient, simulator::ResponseSimulator, traits::ExecutionClient};

pub fn build_client(
    config: &AppConfig,
    connection: ConnectionState,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn ExecutionClient>, ConfigError> {
    match config.execution.backend {
        Backend::Simulator => {
            info!(
                "🎲 [FACTORY] Using response simulator (failure p={}, latency {}ms)",
                config.simulator.failure_probability, config.simulator.latency_ms
            );
            let sim = ResponseSimulator::new(config.simulator.clone(), connection, clock);
            Ok(Arc::new(sim))
        }
        Backend::Binance => {
            let binance = config.require_binance_credentials()?;
            info!("🏦 [FACTORY] Using Binance at {}", binance.base_url);
            let client = BinanceClient::new(binance, connection, clock)
                .map_err(|e| ConfigError::Invalid(format!("binance client: {}", e)))?;
            Ok(Arc::new(client))
        }
    }
}
