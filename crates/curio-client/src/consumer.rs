//! Stream consumer: transport, reconnect backoff, and teardown.

use crate::message::{Conversation, Message};
use crate::sse::SseParser;
use async_trait::async_trait;
use curio_config::ReconnectConfig;
use curio_protocol::{EventPayload, ProtocolError, SessionId};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;

/// Errors surfaced by the client transport and consumer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network-level failure (connect, read, or send).
    #[error("transport error: {0}")]
    Transport(String),
    /// Frame arrived but could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Connection lifecycle as observed by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Dialing the server; `attempt` is zero on the first try.
    Connecting { attempt: u32 },
    /// Stream is live.
    Open,
    /// Waiting out the backoff before the next attempt.
    Backoff { attempt: u32, delay: Duration },
    /// Retry budget spent; only a manual reconnect continues.
    Exhausted,
    /// Torn down; no further attempts will be made.
    Closed,
}

/// Typed event stream produced by a transport connection.
pub type EventStream = BoxStream<'static, Result<EventPayload, ClientError>>;

/// Transport seam so tests can simulate drops without a server.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Open the persistent event stream for a session.
    async fn connect(&self, session_id: SessionId) -> Result<EventStream, ClientError>;

    /// Submit a user message; a separate request, not part of the stream.
    async fn send_message(&self, session_id: SessionId, message: &str) -> Result<(), ClientError>;
}

/// SSE transport over HTTP.
pub struct SseTransport {
    client: reqwest::Client,
    base_url: String,
}

impl SseTransport {
    /// Create a transport rooted at the server's base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl EventTransport for SseTransport {
    async fn connect(&self, session_id: SessionId) -> Result<EventStream, ClientError> {
        let url = format!("{}/api/stream/{}", self.base_url, session_id);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|err| ClientError::Transport(err.to_string()))?
            .error_for_status()
            .map_err(|err| ClientError::Transport(err.to_string()))?;

        let mut parser = SseParser::new();
        let stream = response
            .bytes_stream()
            .flat_map(move |chunk| {
                let items: Vec<Result<EventPayload, ClientError>> = match chunk {
                    Ok(bytes) => parser
                        .push(&bytes)
                        .into_iter()
                        .filter_map(|frame| match EventPayload::from_wire(&frame.event, &frame.data)
                        {
                            Ok(payload) => Some(Ok(payload)),
                            Err(ProtocolError::UnknownEvent(name)) => {
                                debug!("skipping unknown event (event={name})");
                                None
                            }
                            Err(err) => Some(Err(ClientError::Protocol(err))),
                        })
                        .collect(),
                    Err(err) => vec![Err(ClientError::Transport(err.to_string()))],
                };
                futures_util::stream::iter(items)
            })
            .boxed();
        Ok(stream)
    }

    async fn send_message(&self, session_id: SessionId, message: &str) -> Result<(), ClientError> {
        let url = format!("{}/api/chat/{}/message", self.base_url, session_id);
        self.client
            .post(&url)
            .json(&serde_json::json!({ "message": message }))
            .send()
            .await
            .map_err(|err| ClientError::Transport(err.to_string()))?
            .error_for_status()
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        Ok(())
    }
}

/// Exponential backoff with a ceiling: `base * 2^(attempt-1)`, capped.
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(cap)
}

/// Maintains a live view of one session's conversation with reconnects.
pub struct StreamConsumer {
    transport: Arc<dyn EventTransport>,
    session_id: SessionId,
    conversation: Arc<Mutex<Conversation>>,
    status_rx: watch::Receiver<ConnectionStatus>,
    shutdown_tx: watch::Sender<bool>,
    reconnect: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl StreamConsumer {
    /// Start consuming the session's stream; returns immediately.
    pub fn connect(
        transport: Arc<dyn EventTransport>,
        session_id: SessionId,
        config: &ReconnectConfig,
    ) -> Self {
        let conversation = Arc::new(Mutex::new(Conversation::new()));
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting { attempt: 0 });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reconnect = Arc::new(Notify::new());
        let task = tokio::spawn(run_loop(
            transport.clone(),
            session_id,
            conversation.clone(),
            config.clone(),
            status_tx,
            shutdown_rx,
            reconnect.clone(),
        ));
        Self {
            transport,
            session_id,
            conversation,
            status_rx,
            shutdown_tx,
            reconnect,
            task: Some(task),
        }
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.status_rx.borrow().clone()
    }

    /// Watchable status stream for UI subscriptions.
    pub fn status_stream(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Snapshot of the rendered conversation.
    pub fn messages(&self) -> Vec<Message> {
        self.conversation.lock().messages().to_vec()
    }

    /// Skip any pending backoff and retry immediately; also restarts the
    /// loop after the retry budget was exhausted.
    pub fn reconnect_now(&self) {
        self.reconnect.notify_one();
    }

    /// Send a user message, optimistically rendering it before the request
    /// completes and surfacing a local error bubble on failure.
    pub async fn send_message(&self, message: &str) -> Result<(), ClientError> {
        self.conversation.lock().push_user(message);
        match self.transport.send_message(self.session_id, message).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.conversation
                    .lock()
                    .push_local_error(format!("message failed to send: {err}"));
                Err(err)
            }
        }
    }

    /// Close the transport and cancel any pending reconnect timer.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        self.reconnect.notify_one();
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for StreamConsumer {
    /// A leaked reconnect timer could revive a disposed view; dropping the
    /// consumer must kill the loop outright.
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_loop(
    transport: Arc<dyn EventTransport>,
    session_id: SessionId,
    conversation: Arc<Mutex<Conversation>>,
    config: ReconnectConfig,
    status_tx: watch::Sender<ConnectionStatus>,
    mut shutdown_rx: watch::Receiver<bool>,
    reconnect: Arc<Notify>,
) {
    let base = Duration::from_millis(config.base_delay_ms);
    let cap = Duration::from_millis(config.max_delay_ms);
    let mut attempt: u32 = 0;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        let _ = status_tx.send(ConnectionStatus::Connecting { attempt });
        match transport.connect(session_id).await {
            Ok(mut stream) => {
                info!("stream connected (session_id={})", session_id);
                // Reconnection is not resumption: rebuild the projection.
                conversation.lock().reset();
                let _ = status_tx.send(ConnectionStatus::Open);
                attempt = 0;
                loop {
                    tokio::select! {
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                let _ = status_tx.send(ConnectionStatus::Closed);
                                return;
                            }
                        }
                        item = stream.next() => match item {
                            Some(Ok(payload)) => {
                                conversation.lock().apply(&payload);
                            }
                            Some(Err(err)) => {
                                warn!("stream errored (session_id={}): {err}", session_id);
                                break;
                            }
                            None => {
                                warn!("stream ended (session_id={})", session_id);
                                break;
                            }
                        }
                    }
                }
            }
            Err(err) => {
                debug!("connect failed (session_id={}, attempt={}): {err}", session_id, attempt);
            }
        }

        attempt += 1;
        if attempt > config.max_attempts {
            warn!(
                "reconnect budget exhausted (session_id={}, attempts={})",
                session_id, config.max_attempts
            );
            let _ = status_tx.send(ConnectionStatus::Exhausted);
            tokio::select! {
                _ = reconnect.notified() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    attempt = 0;
                    continue;
                }
                _ = shutdown_rx.changed() => break,
            }
        }

        let delay = backoff_delay(attempt, base, cap);
        let _ = status_tx.send(ConnectionStatus::Backoff { attempt, delay });
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            // Manual reconnect bypasses the backoff immediately.
            _ = reconnect.notified() => {}
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
    let _ = status_tx.send(ConnectionStatus::Closed);
}
