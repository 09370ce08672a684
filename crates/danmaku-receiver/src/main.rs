//! Danmaku receiver entry point
//!
//! Run with:
//! ```bash
//! cargo run -p danmaku-receiver
//! ```
//!
//! Configuration is loaded from environment variables (and `.env`).

use danmaku_common::{try_init_tracing_with_config, AppError, ReceiverConfig, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ReceiverConfig::from_env().map_err(AppError::from) {
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
        rooms = ?config.rooms,
        "Starting danmaku receiver"
    );

    if let Err(e) = danmaku_receiver::run(config).await {
        error!(error = %e, code = e.error_code(), "Receiver failed");
        std::process::exit(1);
    }
}
