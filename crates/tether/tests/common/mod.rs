#![allow(dead_code)]

//! Shared helpers for integration tests: fake transports that replay or
//! relay event sequences, and a recording observer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use tether::protocol::{
    CreateRunRequest, MessagePart, RunError, RunEvent, RunId, RunSnapshot, RunStatus, SessionId,
};
use tether::transport::{EventStream, Transport, TransportError};
use tether::{AgentRunner, RunClient, RunObserver};

// ============================================================================
// Event builders
// ============================================================================

pub fn snapshot(run_id: &str, session_id: &str, status: RunStatus) -> RunSnapshot {
    RunSnapshot {
        run_id: RunId::from(run_id),
        session_id: SessionId::from(session_id),
        status,
        error: None,
        created_at: None,
        finished_at: None,
    }
}

pub fn created() -> RunEvent {
    created_on("run-1", "sess-1")
}

pub fn created_on(run_id: &str, session_id: &str) -> RunEvent {
    RunEvent::RunCreated {
        run: snapshot(run_id, session_id, RunStatus::Created),
    }
}

pub fn part(content: &str) -> RunEvent {
    RunEvent::MessagePart {
        part: MessagePart::text(content),
    }
}

pub fn artifact(name: &str, content: &str) -> RunEvent {
    RunEvent::MessagePart {
        part: MessagePart::artifact(name, content),
    }
}

pub fn completed() -> RunEvent {
    RunEvent::RunCompleted {
        run: snapshot("run-1", "sess-1", RunStatus::Completed),
    }
}

pub fn failed(code: &str, message: &str) -> RunEvent {
    RunEvent::RunFailed {
        run: snapshot("run-1", "sess-1", RunStatus::Failed),
        error: RunError::new(code, message),
    }
}

// ============================================================================
// Fake transports
// ============================================================================

/// Replays fixed scripts, one per `open` call, and records every request.
pub struct ScriptedTransport {
    scripts: Mutex<Vec<Vec<Result<RunEvent, TransportError>>>>,
    requests: Mutex<Vec<CreateRunRequest>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<RunEvent, TransportError>>) -> Arc<Self> {
        Self::with_scripts(vec![script])
    }

    pub fn with_scripts(scripts: Vec<Vec<Result<RunEvent, TransportError>>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<CreateRunRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(
        &self,
        request: CreateRunRequest,
        _cancel: CancellationToken,
    ) -> Result<EventStream, TransportError> {
        self.requests.lock().unwrap().push(request);

        let mut scripts = self.scripts.lock().unwrap();
        if scripts.is_empty() {
            return Err(TransportError::Connect("no script left".to_string()));
        }
        let script = scripts.remove(0);
        Ok(Box::pin(futures::stream::iter(script)))
    }
}

/// Relays items pushed by the test body, ending on channel close or local
/// cancellation, like the real transport.
pub struct ChannelTransport {
    rx: Mutex<Option<mpsc::Receiver<Result<RunEvent, TransportError>>>>,
    opened: AtomicUsize,
}

impl ChannelTransport {
    pub fn pair() -> (Arc<Self>, mpsc::Sender<Result<RunEvent, TransportError>>) {
        let (tx, rx) = mpsc::channel(16);
        let transport = Arc::new(Self {
            rx: Mutex::new(Some(rx)),
            opened: AtomicUsize::new(0),
        });
        (transport, tx)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn open(
        &self,
        _request: CreateRunRequest,
        cancel: CancellationToken,
    ) -> Result<EventStream, TransportError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| TransportError::Connect("stream already opened".to_string()))?;
        Ok(Box::pin(
            ReceiverStream::new(rx).take_until(cancel.cancelled_owned()),
        ))
    }
}

/// Rejects every `open` with the given HTTP status.
pub struct RejectingTransport(pub reqwest::StatusCode);

#[async_trait]
impl Transport for RejectingTransport {
    async fn open(
        &self,
        _request: CreateRunRequest,
        _cancel: CancellationToken,
    ) -> Result<EventStream, TransportError> {
        Err(TransportError::Status(self.0))
    }
}

// ============================================================================
// Observers
// ============================================================================

/// Shared recording handle; hand out observers from it and assert afterwards.
#[derive(Clone, Default)]
pub struct Recording {
    inner: Arc<Mutex<RecordingInner>>,
}

#[derive(Default)]
struct RecordingInner {
    event_types: Vec<String>,
    deltas: Vec<String>,
    artifacts: Vec<MessagePart>,
}

impl Recording {
    pub fn observer(&self) -> RecordingObserver {
        RecordingObserver {
            inner: Arc::clone(&self.inner),
            notify: None,
        }
    }

    /// Observer that additionally sends every applied event to `notify`,
    /// letting the test body sequence its actions against the event loop.
    pub fn observer_notifying(
        &self,
        notify: mpsc::UnboundedSender<RunEvent>,
    ) -> RecordingObserver {
        RecordingObserver {
            inner: Arc::clone(&self.inner),
            notify: Some(notify),
        }
    }

    pub fn event_types(&self) -> Vec<String> {
        self.inner.lock().unwrap().event_types.clone()
    }

    pub fn deltas(&self) -> Vec<String> {
        self.inner.lock().unwrap().deltas.clone()
    }

    pub fn artifacts(&self) -> Vec<MessagePart> {
        self.inner.lock().unwrap().artifacts.clone()
    }
}

pub struct RecordingObserver {
    inner: Arc<Mutex<RecordingInner>>,
    notify: Option<mpsc::UnboundedSender<RunEvent>>,
}

impl RunObserver for RecordingObserver {
    fn on_event(&mut self, event: &RunEvent) {
        self.inner
            .lock()
            .unwrap()
            .event_types
            .push(event.event_type().to_string());
        if let Some(notify) = &self.notify {
            let _ = notify.send(event.clone());
        }
    }

    fn on_delta(&mut self, delta: &str) {
        self.inner.lock().unwrap().deltas.push(delta.to_string());
    }

    fn on_artifact(&mut self, part: &MessagePart) {
        self.inner.lock().unwrap().artifacts.push(part.clone());
    }
}

// ============================================================================
// Runner wiring
// ============================================================================

/// Runner over a fake transport. The client points at a discard port; the
/// only traffic it could emit is the fire-and-forget remote cancel.
pub fn runner_with(transport: Arc<dyn Transport>) -> Arc<AgentRunner> {
    let client = Arc::new(RunClient::new("http://127.0.0.1:9"));
    Arc::new(AgentRunner::with_transport(client, "demo", transport))
}
