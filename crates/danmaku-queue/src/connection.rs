//! Broker connection helper

use lapin::{Connection, ConnectionProperties};

use crate::error::QueueResult;

/// Open an AMQP connection and log asynchronous connection errors
///
/// `name` identifies the broker instance in logs.
pub async fn connect(url: &str, name: &str) -> QueueResult<Connection> {
    let properties = ConnectionProperties::default().with_connection_name(name.into());
    let connection = Connection::connect(url, properties).await?;

    let broker = name.to_string();
    connection.on_error(move |err| {
        tracing::error!(broker = %broker, error = %err, "RabbitMQ connection error");
    });

    tracing::info!(broker = %name, url = %redact_url(url), "RabbitMQ connection established");
    Ok(connection)
}

/// Strip credentials from a broker URL for logging
#[must_use]
pub fn redact_url(url: &str) -> &str {
    match url.rsplit_once('@') {
        Some((_, host)) => host,
        None => url,
    }
}
