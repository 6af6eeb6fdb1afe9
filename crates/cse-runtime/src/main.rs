//! # CSE Delivery Runtime
//!
//! Runs the asynchronous delivery core of one CSE: polling channels for
//! entities that cannot be reached directly and group fan-out.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (`CSE_LOG_LEVEL`, `CSE_JSON_LOGS`)
//! 2. Load configuration (defaults, `CSE_CONFIG` file, `CSE_*` overrides)
//! 3. Build the delivery container
//! 4. Start the polling channel sweeper
//! 5. Run until Ctrl-C, then stop background tasks

use anyhow::{Context, Result};
use cse_runtime::{CseConfig, DeliveryContainer};
use cse_telemetry::{init_telemetry, log_event, TelemetryConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::from_env())
        .context("Failed to initialize telemetry")?;

    let config = match CseConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return Err(e).context("Failed to load configuration");
        }
    };

    info!("===========================================");
    info!("  CSE Delivery Runtime v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");

    let container = DeliveryContainer::new(config);
    container.start_background_tasks();

    log_event!(
        info,
        "runtime",
        "Delivery core ready",
        cse_id = %container.config.cse_id,
        allow_all_access = container.config.allow_all_access
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutdown signal received");
    container.shutdown().await;
    Ok(())
}
