//! # danmaku-processor
//!
//! Consumes envelopes from every configured broker instance and persists
//! them to SQLite.

pub mod processor;

pub use processor::EnvelopeProcessor;

use std::sync::Arc;

use danmaku_common::{shutdown_signal, AppError, AppResult, ProcessorConfig};
use danmaku_db::{create_pool, init_schema, SqliteMessageStore, SqlitePool};
use danmaku_queue::{redact_url, Consumer, ConsumerConfig, Topology};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Run the processor until a termination signal
///
/// # Errors
///
/// Fails if the database cannot be opened or its schema created, or if a
/// reachable broker refuses the topology. Broker connection errors are
/// retried by each consumer and never surface here.
pub async fn run(config: ProcessorConfig) -> AppResult<()> {
    let pool = create_pool(&config.database)
        .await
        .map_err(AppError::database)?;
    init_schema(&pool).await.map_err(AppError::database)?;
    tracing::info!(url = %config.database.url, "Database ready");

    let handler = Arc::new(EnvelopeProcessor::new(Arc::new(SqliteMessageStore::new(
        pool.clone(),
    ))));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut consumers = Vec::with_capacity(config.brokers.len());
    for instance in &config.brokers {
        tracing::info!(
            broker = %instance.name,
            url = %redact_url(&instance.url),
            "Starting consumer"
        );
        let started = Consumer::new(
            ConsumerConfig::for_instance(instance, &config),
            Topology::default(),
            handler.clone(),
        )
        .start(shutdown_rx.clone())
        .await;

        match started {
            Ok(consumer) => consumers.push(consumer),
            Err(e) => {
                let _ = shutdown_tx.send(true);
                stop(consumers, pool).await;
                return Err(AppError::Topology(format!("{}: {e}", instance.name)));
            }
        }
    }

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
    stop(consumers, pool).await;
    tracing::info!("Processor stopped");
    Ok(())
}

async fn stop(consumers: Vec<JoinHandle<()>>, pool: SqlitePool) {
    for consumer in consumers {
        if let Err(e) = consumer.await {
            tracing::error!(error = %e, "Consumer task failed");
        }
    }
    pool.close().await;
}
