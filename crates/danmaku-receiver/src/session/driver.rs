//! WebSocket driver
//!
//! Owns the socket for one session. A writer task drains the session's
//! outbound channel into the socket; the read loop feeds binary messages to
//! the session and publishes whatever it forwards, in order.

use std::time::Duration;

use bytes::Bytes;
use danmaku_core::QueueEnvelope;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, WebSocketStream};

use super::error::SessionError;
use super::session::{Credentials, Session};
use super::state::SessionState;
use crate::sink::EnvelopeSink;

/// Outbound frames buffered before the writer applies backpressure
const OUTBOUND_BUFFER_SIZE: usize = 32;

/// How long the writer gets to flush and send a close frame
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a session ended without a transport error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Shutdown was requested
    Shutdown,
    /// The server closed the socket
    Disconnected,
}

/// Per-session parameters
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub room_id: i64,
    pub credentials: Credentials,
    pub heartbeat_interval: Duration,
}

/// Connect to `url` and run a session until close, error or shutdown
pub async fn run_session<K, F>(
    url: &str,
    options: SessionOptions,
    sink: &K,
    shutdown: &mut watch::Receiver<bool>,
    report: F,
) -> Result<SessionEnd, SessionError>
where
    K: EnvelopeSink + ?Sized,
    F: Fn(SessionState) + Send + Sync,
{
    if *shutdown.borrow() {
        return Ok(SessionEnd::Shutdown);
    }

    report(SessionState::Connecting);
    tracing::debug!(url, "Connecting");

    let connected = tokio::select! {
        result = connect_async(url) => result,
        _ = shutdown.changed() => return Ok(SessionEnd::Shutdown),
    };

    let (ws, _response) = match connected {
        Ok(ok) => ok,
        Err(e) => {
            report(SessionState::Closed);
            return Err(e.into());
        }
    };

    drive_socket(ws, options, sink, shutdown, report).await
}

/// Run a session over an already open WebSocket
pub async fn drive_socket<S, K, F>(
    ws: WebSocketStream<S>,
    options: SessionOptions,
    sink: &K,
    shutdown: &mut watch::Receiver<bool>,
    report: F,
) -> Result<SessionEnd, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    K: EnvelopeSink + ?Sized,
    F: Fn(SessionState) + Send + Sync,
{
    let room_id = options.room_id;
    let (tx, mut rx) = mpsc::channel::<Bytes>(OUTBOUND_BUFFER_SIZE);
    let (mut ws_sink, mut ws_stream) = ws.split();

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = ws_sink.send(Message::Binary(frame.to_vec())).await {
                tracing::warn!(room_id, error = %e, "Failed to write to WebSocket");
                return;
            }
        }
        if let Err(e) = ws_sink.close().await {
            tracing::debug!(room_id, error = %e, "Failed to close WebSocket");
        }
    });

    let mut session = Session::new(
        room_id,
        options.credentials,
        options.heartbeat_interval,
        tx,
    );

    let outcome = match session.on_open().await {
        Ok(()) => {
            report(session.state());
            read_loop(&mut session, &mut ws_stream, sink, shutdown, &report).await
        }
        Err(e) => Err(e),
    };

    session.on_close();
    report(SessionState::Closed);
    drop(session);

    if tokio::time::timeout(CLOSE_TIMEOUT, &mut writer).await.is_err() {
        writer.abort();
    }

    match &outcome {
        Ok(end) => tracing::info!(room_id, end = ?end, "Session ended"),
        Err(e) => tracing::warn!(room_id, error = %e, "Session failed"),
    }
    outcome
}

async fn read_loop<St, K, F>(
    session: &mut Session,
    stream: &mut St,
    sink: &K,
    shutdown: &mut watch::Receiver<bool>,
    report: &F,
) -> Result<SessionEnd, SessionError>
where
    St: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
    K: EnvelopeSink + ?Sized,
    F: Fn(SessionState) + Send + Sync,
{
    loop {
        if *shutdown.borrow() {
            return Ok(SessionEnd::Shutdown);
        }

        tokio::select! {
            next = stream.next() => match next {
                Some(Ok(Message::Binary(data))) => {
                    let before = session.state();
                    let events = session.on_message(Bytes::from(data));
                    if session.state() != before {
                        report(session.state());
                    }

                    for event in events {
                        let envelope = QueueEnvelope::new(session.room_id(), event.payload);
                        if let Err(e) = sink.publish(&envelope).await {
                            tracing::error!(
                                room_id = session.room_id(),
                                operation = %event.operation,
                                packet = %envelope.packet,
                                error = %e,
                                "Failed to forward event"
                            );
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(room_id = session.room_id(), frame = ?frame, "Server closed connection");
                    return Ok(SessionEnd::Disconnected);
                }
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!(room_id = session.room_id(), len = text.len(), "Ignoring text message");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(SessionEnd::Disconnected),
            },
            changed = shutdown.changed() => {
                if changed.is_err() {
                    return Ok(SessionEnd::Shutdown);
                }
            }
        }
    }
}
