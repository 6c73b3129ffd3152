//! The progress client: drives a [`ReconnectMachine`] against a
//! [`ProgressSource`] and publishes what it sees on `watch` channels.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use hookreel_core::progress::ProgressEvent;
use hookreel_core::types::Percent;
use reqwest::header::ACCEPT;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::backoff::RetryPolicy;
use crate::machine::{Action, ConnectionEvent, ConnectionState, ReconnectMachine};
use crate::sse::SseDecoder;

/// Progress values from one open connection. The stream ending means
/// the connection closed.
pub type ProgressStream = BoxStream<'static, Result<Percent, ProgressClientError>>;

#[derive(Debug, thiserror::Error)]
pub enum ProgressClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Progress endpoint returned status {0}")]
    Status(u16),

    #[error("Gave up after {attempts} connection attempts")]
    ReconnectExhausted { attempts: u32 },
}

/// Opens one streaming connection to the progress channel.
#[async_trait]
pub trait ProgressSource: Send + Sync {
    async fn open(&self) -> Result<ProgressStream, ProgressClientError>;
}

// ---------------------------------------------------------------------------
// SSE source
// ---------------------------------------------------------------------------

/// Reads the server's `text/event-stream` progress endpoint.
pub struct SseProgressSource {
    client: reqwest::Client,
    url: String,
}

impl SseProgressSource {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

/// Parse one event payload. Malformed payloads are skipped.
fn parse_event(data: String) -> Option<Percent> {
    match serde_json::from_str::<ProgressEvent>(&data) {
        Ok(event) => Some(event.progress.min(100)),
        Err(e) => {
            tracing::warn!(error = %e, data = %data, "Ignoring malformed progress event");
            None
        }
    }
}

#[async_trait]
impl ProgressSource for SseProgressSource {
    async fn open(&self) -> Result<ProgressStream, ProgressClientError> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProgressClientError::Status(status.as_u16()));
        }

        let mut decoder = SseDecoder::new();
        let values = response.bytes_stream().flat_map(move |chunk| {
            let items: Vec<Result<Percent, ProgressClientError>> = match chunk {
                Ok(bytes) => decoder
                    .push(&bytes)
                    .into_iter()
                    .filter_map(parse_event)
                    .map(Ok)
                    .collect(),
                Err(e) => vec![Err(e.into())],
            };
            stream::iter(items)
        });

        Ok(values.boxed())
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// How one connected session ended.
enum SessionEnd {
    Dropped,
    Cancelled,
}

pub struct ProgressClient {
    source: Arc<dyn ProgressSource>,
    machine: ReconnectMachine,
    state_tx: watch::Sender<ConnectionState>,
    progress_tx: watch::Sender<Option<Percent>>,
    attempts: u32,
}

impl ProgressClient {
    pub fn new(source: Arc<dyn ProgressSource>, policy: RetryPolicy) -> Self {
        Self::with_machine(source, ReconnectMachine::new(policy))
    }

    pub fn with_machine(source: Arc<dyn ProgressSource>, machine: ReconnectMachine) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (progress_tx, _) = watch::channel(None);
        Self {
            source,
            machine,
            state_tx,
            progress_tx,
            attempts: 0,
        }
    }

    /// Connection state, updated on every transition.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Latest progress value seen, `None` before the first event.
    pub fn progress(&self) -> watch::Receiver<Option<Percent>> {
        self.progress_tx.subscribe()
    }

    /// Keep the view live until `cancel` fires (returns `Ok`) or the retry
    /// budget is spent (returns [`ProgressClientError::ReconnectExhausted`]).
    /// Nothing is left running after this returns.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), ProgressClientError> {
        let mut action = self.transition(ConnectionEvent::Start);

        loop {
            action = match action {
                Action::Open => {
                    self.attempts += 1;
                    let opened = tokio::select! {
                        _ = cancel.cancelled() => None,
                        opened = self.source.open() => Some(opened),
                    };
                    let Some(opened) = opened else {
                        self.stop();
                        return Ok(());
                    };

                    match opened {
                        Ok(stream) => {
                            tracing::info!(attempt = self.attempts, "Progress stream connected");
                            self.transition(ConnectionEvent::Opened);
                            match self.listen(stream, &cancel).await {
                                SessionEnd::Cancelled => {
                                    self.stop();
                                    return Ok(());
                                }
                                SessionEnd::Dropped => self.transition(ConnectionEvent::Dropped),
                            }
                        }
                        Err(e) => {
                            tracing::warn!(
                                attempt = self.attempts,
                                error = %e,
                                "Progress stream connection failed",
                            );
                            self.transition(ConnectionEvent::Dropped)
                        }
                    }
                }
                Action::Wait(delay) => {
                    tracing::info!(
                        retry = self.machine.retry_count(),
                        delay_ms = delay.as_millis() as u64,
                        "Reconnecting to progress stream",
                    );
                    let cancelled = tokio::select! {
                        _ = cancel.cancelled() => true,
                        _ = tokio::time::sleep(delay) => false,
                    };
                    if cancelled {
                        self.stop();
                        return Ok(());
                    }
                    self.transition(ConnectionEvent::TimerFired)
                }
                Action::GiveUp => {
                    tracing::error!(attempts = self.attempts, "Progress stream reconnect exhausted");
                    return Err(ProgressClientError::ReconnectExhausted {
                        attempts: self.attempts,
                    });
                }
                Action::Listen | Action::Ignore => {
                    // The loop only feeds events that map to Open, Wait or GiveUp.
                    tracing::error!(?action, "Unexpected progress client action");
                    self.transition(ConnectionEvent::Dropped)
                }
            };
        }
    }

    async fn listen(&mut self, mut stream: ProgressStream, cancel: &CancellationToken) -> SessionEnd {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return SessionEnd::Cancelled,
                next = stream.next() => match next {
                    Some(Ok(progress)) => {
                        tracing::trace!(progress, "Progress received");
                        self.progress_tx.send_replace(Some(progress));
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Progress stream errored");
                        return SessionEnd::Dropped;
                    }
                    None => {
                        tracing::info!("Progress stream closed");
                        return SessionEnd::Dropped;
                    }
                },
            }
        }
    }

    fn transition(&mut self, event: ConnectionEvent) -> Action {
        let action = self.machine.on_event(event);
        self.state_tx.send_replace(self.machine.state());
        action
    }

    fn stop(&mut self) {
        tracing::info!("Progress client stopped");
        self.state_tx.send_replace(ConnectionState::Disconnected);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
