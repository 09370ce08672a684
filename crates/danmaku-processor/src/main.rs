//! Danmaku processor entry point
//!
//! Run with:
//! ```bash
//! cargo run -p danmaku-processor
//! ```
//!
//! Configuration is loaded from environment variables (and `.env`).

use danmaku_common::{try_init_tracing_with_config, AppError, ProcessorConfig, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ProcessorConfig::from_env().map_err(AppError::from) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e} ({})", e.error_code());
            std::process::exit(1);
        }
    };

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        env = ?config.app.env,
        brokers = config.brokers.len(),
        prefetch = config.prefetch_count,
        max_deliveries = ?config.max_deliveries,
        "Starting danmaku processor"
    );

    if let Err(e) = danmaku_processor::run(config).await {
        error!(error = %e, code = e.error_code(), "Processor failed");
        std::process::exit(1);
    }
}
