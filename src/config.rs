use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::constants::{binance, execution, orders, simulator};
use crate::error::ConfigError;
use crate::exchange::simulator::to_cents;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Simulator,
    Binance,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub backend: Backend,
    pub submit_timeout_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Simulator,
            submit_timeout_ms: execution::DEFAULT_SUBMIT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl ExecutionConfig {
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub failure_probability: f64,
    pub latency_ms: u64,
    pub connect_latency_ms: u64,
    pub fill_price_min: Decimal,
    pub fill_price_max: Decimal,
    /// Fixed seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            failure_probability: simulator::DEFAULT_FAILURE_PROBABILITY,
            latency_ms: simulator::DEFAULT_LATENCY.as_millis() as u64,
            connect_latency_ms: simulator::DEFAULT_CONNECT_LATENCY.as_millis() as u64,
            fill_price_min: simulator::default_fill_price_min(),
            fill_price_max: simulator::default_fill_price_max(),
            seed: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BinanceConfig {
    pub api_key: String,
    pub secret_key: String,
    pub base_url: String,
    pub recv_window_ms: u64,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            secret_key: String::new(),
            base_url: binance::TESTNET_BASE_URL.to_string(),
            recv_window_ms: binance::DEFAULT_RECV_WINDOW_MS,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OrderRulesConfig {
    pub quote_asset: String,
    pub min_quantity: Decimal,
    pub quantity_precision: u32,
    pub price_precision: u32,
}

impl Default for OrderRulesConfig {
    fn default() -> Self {
        Self {
            quote_asset: orders::QUOTE_ASSET.to_string(),
            min_quantity: orders::min_quantity(),
            quantity_precision: orders::QUANTITY_PRECISION,
            price_precision: orders::PRICE_PRECISION,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// tracing filter directive, e.g. "info" or "order_desk=debug"
    pub log_level: Option<String>,
    pub server: ServerConfig,
    pub execution: ExecutionConfig,
    pub simulator: SimulatorConfig,
    pub binance: BinanceConfig,
    pub orders: OrderRulesConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Read `path`, falling back to defaults when it does not exist, then
    /// apply `API_KEY` / `API_SECRET` from the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = match fs::read_to_string(path) {
            Ok(content) => Self::from_yaml_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("⚠️ {} not found, using default configuration", path.display());
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        // Strip BOM if present
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: AppConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("API_KEY") {
            self.binance.api_key = key;
        }
        if let Ok(secret) = std::env::var("API_SECRET") {
            self.binance.secret_key = secret;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulator;
        if !(0.0..=1.0).contains(&sim.failure_probability) {
            return Err(ConfigError::Invalid(format!(
                "simulator.failure_probability must be within [0, 1], got {}",
                sim.failure_probability
            )));
        }
        if sim.fill_price_min <= Decimal::ZERO || sim.fill_price_max <= sim.fill_price_min {
            return Err(ConfigError::Invalid(format!(
                "simulator fill price band must satisfy 0 < min < max, got [{}, {})",
                sim.fill_price_min, sim.fill_price_max
            )));
        }
        let min_cents = to_cents(sim.fill_price_min);
        let max_cents = to_cents(sim.fill_price_max);
        if !matches!((min_cents, max_cents), (Some(lo), Some(hi)) if lo >= 1 && hi > lo) {
            return Err(ConfigError::Invalid(format!(
                "simulator fill price band [{}, {}) must span at least one cent and fit in i64 cents",
                sim.fill_price_min, sim.fill_price_max
            )));
        }
        if self.orders.min_quantity <= Decimal::ZERO {
            return Err(ConfigError::Invalid(format!(
                "orders.min_quantity must be positive, got {}",
                self.orders.min_quantity
            )));
        }
        if self.orders.quote_asset.trim().is_empty() {
            return Err(ConfigError::Invalid("orders.quote_asset must not be empty".to_string()));
        }
        if self.execution.submit_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "execution.submit_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Binance credentials are only required when Binance is the backend
    pub fn require_binance_credentials(&self) -> Result<&BinanceConfig, ConfigError> {
        if self.binance.api_key.is_empty() || self.binance.secret_key.is_empty() {
            return Err(ConfigError::Invalid(
                "Binance backend selected but API_KEY / API_SECRET are missing (add them to .env)"
                    .to_string(),
            ));
        }
        Ok(&self.binance)
    }
}
