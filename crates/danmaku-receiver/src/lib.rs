//! # danmaku-receiver
//!
//! Connects to the live chat gateway for each configured room, decodes the
//! binary frame protocol and publishes every forwarded event to the broker.

pub mod api;
pub mod orchestrator;
pub mod protocol;
pub mod session;
pub mod sink;

use std::sync::Arc;
use std::time::Duration;

use danmaku_common::{shutdown_signal, AppError, AppResult, ReceiverConfig};
use danmaku_queue::{redact_url, Producer, ProducerConfig, Topology};
use tokio::sync::watch;

use crate::api::BiliApiClient;
use crate::orchestrator::{Orchestrator, OrchestratorSettings, RoomRegistry};

/// Interval between room status summaries
const STATUS_INTERVAL: Duration = Duration::from_secs(60);

/// Run the receiver until a termination signal
///
/// # Errors
///
/// Fails if the broker is unreachable or the topology cannot be declared.
pub async fn run(config: ReceiverConfig) -> AppResult<()> {
    let lookup = BiliApiClient::new(&config.bilibili)
        .map_err(|e| AppError::ExternalService(e.to_string()))?;

    tracing::info!(broker = %redact_url(&config.broker.url), "Connecting to broker");
    let producer = Producer::connect(ProducerConfig::from(&config.broker), Topology::default())
        .await
        .map_err(AppError::broker)?;
    producer
        .declare_topology()
        .await
        .map_err(|e| AppError::Topology(e.to_string()))?;
    let producer = Arc::new(producer);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let orchestrator = Orchestrator::new(
        config.rooms.clone(),
        OrchestratorSettings::from(&config),
        Arc::new(lookup),
        producer.clone(),
    );
    let registry = orchestrator.registry();
    let fleet = orchestrator.spawn(shutdown_rx.clone());
    let reporter = tokio::spawn(report_status(registry, shutdown_rx));

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    if let Err(e) = fleet.await {
        tracing::error!(error = %e, "Orchestrator task failed");
    }
    if let Err(e) = reporter.await {
        tracing::debug!(error = %e, "Status reporter task failed");
    }

    producer.close().await.map_err(AppError::broker)?;
    tracing::info!("Receiver stopped");
    Ok(())
}

async fn report_status(registry: Arc<RoomRegistry>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(STATUS_INTERVAL);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => registry.log_summary(),
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
