use order_desk::api::{run_server, AppState};
use order_desk::clock::{Clock, SystemClock};
use order_desk::config::AppConfig;
use order_desk::connection::ConnectionState;
use order_desk::exchange::factory::build_client;
use order_desk::services::desk::OrderDesk;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // API_KEY / API_SECRET live in .env
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    // Setup Logging
    let filter = match &config.log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Order Desk...");
    info!(
        "Backend: {:?}, submit timeout: {}ms",
        config.execution.backend, config.execution.submit_timeout_ms
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let client = build_client(&config, ConnectionState::new(), clock.clone())?;
    let desk = OrderDesk::from_config(&config, client, clock);

    info!("Initializing API Server...");
    let state = Arc::new(AppState { desk });
    run_server(state, &config.server.bind_addr).await?;

    Ok(())
}
