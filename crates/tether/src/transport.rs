//! Stream transport.
//!
//! Opens exactly one streaming connection per run and exposes the decoded
//! envelopes as an ordered, cancellable sequence. Envelope framing is
//! handled by the SSE layer; decoding is delegated to the protocol codec.
//!
//! A run stream never reconnects: the first transport or decode error ends
//! the sequence, and the orchestrator turns it into the run's single terminal
//! signal if no terminal event was already observed.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use log::{debug, warn};
use reqwest::header;
use reqwest_eventsource::{Event, EventSource};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use tether_protocol::codec::DecodeError;
use tether_protocol::{CreateRunRequest, RunEvent, decode_envelope};

/// Buffer size for the decoded-event channel.
const DEFAULT_EVENT_BUFFER: usize = 256;

/// Errors produced by a stream transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The streaming connection could not be established.
    #[error("failed to establish run stream: {0}")]
    Connect(String),

    /// The server rejected the run request before streaming.
    #[error("run stream rejected with HTTP status {0}")]
    Status(reqwest::StatusCode),

    /// An envelope on the stream was malformed. Unrecoverable for this run.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The connection was severed mid-stream.
    #[error("run stream severed: {0}")]
    Network(String),
}

/// Ordered sequence of decoded events for one run. Ends after the first
/// error item, if any.
pub type EventStream = BoxStream<'static, Result<RunEvent, TransportError>>;

/// A way to open one run stream per call.
///
/// The production implementation is [`SseTransport`]; tests substitute fakes
/// that replay scripted event sequences.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the streaming connection for `request`.
    ///
    /// Rejects before producing any event when the connection cannot be
    /// established. Triggering `cancel` stops consumption promptly and
    /// releases the underlying connection.
    async fn open(
        &self,
        request: CreateRunRequest,
        cancel: CancellationToken,
    ) -> Result<EventStream, TransportError>;
}

/// SSE transport: POSTs the run request and consumes the event-stream
/// response.
pub struct SseTransport {
    client: reqwest::Client,
    endpoint: String,
    buffer_size: usize,
}

impl SseTransport {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            buffer_size: DEFAULT_EVENT_BUFFER,
        }
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn open(
        &self,
        request: CreateRunRequest,
        cancel: CancellationToken,
    ) -> Result<EventStream, TransportError> {
        let builder = self
            .client
            .post(&self.endpoint)
            .header(header::ACCEPT, "text/event-stream")
            .json(&request);

        let mut source =
            EventSource::new(builder).map_err(|e| TransportError::Connect(e.to_string()))?;

        let (tx, rx) = mpsc::channel(self.buffer_size);

        // Drive the connection until it is established, so that a refused
        // connection or a non-2xx response rejects here, before any event.
        match source.next().await {
            Some(Ok(Event::Open)) => {}
            Some(Ok(Event::Message(message))) => match decode_envelope(&message.data) {
                Ok(event) => {
                    let _ = tx.try_send(Ok(event));
                }
                Err(error) => {
                    source.close();
                    let _ = tx.try_send(Err(TransportError::Decode(error)));
                    return Ok(Box::pin(ReceiverStream::new(rx)));
                }
            },
            Some(Err(error)) => {
                source.close();
                return Err(connect_error(error));
            }
            None => {
                return Err(TransportError::Connect(
                    "stream closed before it was established".to_string(),
                ));
            }
        }

        debug!("run stream established against {}", self.endpoint);
        tokio::spawn(read_loop(source, tx, cancel));

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Consume the established SSE connection, decoding envelopes in arrival
/// order. Ends on local cancellation, stream end, or the first error.
async fn read_loop(
    mut source: EventSource,
    tx: mpsc::Sender<Result<RunEvent, TransportError>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("run stream cancelled locally");
                break;
            }
            next = source.next() => match next {
                None => break,
                Some(Ok(Event::Open)) => {
                    // A second open would mean the SSE layer reconnected,
                    // which must never happen for a run stream.
                    warn!("unexpected reopen on run stream; closing");
                    break;
                }
                Some(Ok(Event::Message(message))) => match decode_envelope(&message.data) {
                    Ok(event) => {
                        if tx.send(Ok(event)).await.is_err() {
                            debug!("run stream consumer went away");
                            break;
                        }
                    }
                    Err(error) => {
                        let _ = tx.send(Err(TransportError::Decode(error))).await;
                        break;
                    }
                },
                Some(Err(reqwest_eventsource::Error::StreamEnded)) => break,
                Some(Err(error)) => {
                    let _ = tx.send(Err(TransportError::Network(error.to_string()))).await;
                    break;
                }
            }
        }
    }
    source.close();
}

fn connect_error(error: reqwest_eventsource::Error) -> TransportError {
    match error {
        reqwest_eventsource::Error::InvalidStatusCode(status, _) => TransportError::Status(status),
        other => TransportError::Connect(other.to_string()),
    }
}
