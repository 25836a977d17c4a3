use anyhow::Result;
use payroll_core::{config::Config, server, telemetry};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let prometheus_handle = telemetry::init(&config.telemetry)?;

    info!("Starting {}", config.app_name);
    info!("HTTP server listening on {}", config.http_addr());
    info!(
        strategy = %config.database.nested_strategy,
        metrics = prometheus_handle.is_some(),
        "Transaction and telemetry settings loaded"
    );

    server::run(config, prometheus_handle).await
}
