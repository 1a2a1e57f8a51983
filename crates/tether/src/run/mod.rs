//! Run orchestration.
//!
//! [`AgentRunner`] wires the transport, the lifecycle state machine, the
//! message assembler, and the cancellation state into one `run` operation per
//! turn. Events are consumed and applied strictly one at a time, in arrival
//! order; the only suspension point is awaiting the next event. One runner is
//! one conversation: the session identifier captured on the first turn is
//! reused on every following turn.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use log::{debug, info, warn};

use tether_protocol::{
    CreateRunRequest, InputMessage, MessagePart, RunError, RunEvent, RunId, RunMode, RunStatus,
    SessionId,
};

use crate::client::RunClient;
use crate::error::{ClientError, ClientResult};
use crate::transport::{Transport, TransportError};

pub mod assembler;
mod cancel;
pub mod lifecycle;

pub use assembler::{AssembledMessage, AssemblerSignal, MessageAssembler, MessageStatus};
pub use lifecycle::{RunLifecycle, RunState};

use cancel::CancelState;

/// Push interface for watching a run as it streams.
///
/// All methods default to no-ops; implement only the channels you need.
/// Callbacks run on the event loop, so they must not block.
pub trait RunObserver: Send {
    /// Every decoded event, in arrival order.
    fn on_event(&mut self, _event: &RunEvent) {}

    /// Narrative content just appended to the assembled message.
    fn on_delta(&mut self, _delta: &str) {}

    /// Artifact side channel; these parts never reach the message content.
    fn on_artifact(&mut self, _part: &MessagePart) {}
}

/// Observer that ignores everything.
impl RunObserver for () {}

/// The result of one turn.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Absent when the run was never created server-side.
    pub run_id: Option<RunId>,
    pub session_id: Option<SessionId>,
    /// Terminal status: completed, failed, or cancelled.
    pub status: RunStatus,
    /// Classified error when the run failed. Cancellation carries none.
    pub error: Option<RunError>,
    pub message: AssembledMessage,
}

/// Drives runs against one agent, one conversation at a time.
pub struct AgentRunner {
    client: Arc<RunClient>,
    transport: Arc<dyn Transport>,
    agent: String,
    session_id: Mutex<Option<SessionId>>,
    in_flight: AtomicBool,
    active: Mutex<Option<Arc<CancelState>>>,
}

impl AgentRunner {
    pub fn new(client: Arc<RunClient>, agent: impl Into<String>) -> Self {
        let transport = Arc::new(client.transport());
        Self::with_transport(client, agent, transport)
    }

    /// Build a runner over a custom transport. Tests use this to replay
    /// scripted event sequences.
    pub fn with_transport(
        client: Arc<RunClient>,
        agent: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            client,
            transport,
            agent: agent.into(),
            session_id: Mutex::new(None),
            in_flight: AtomicBool::new(false),
            active: Mutex::new(None),
        }
    }

    /// Seed the conversation with a previously captured session.
    pub fn with_session(self, session_id: SessionId) -> Self {
        *self.lock_session() = Some(session_id);
        self
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// The session captured from the server, if any turn completed creation.
    pub fn session_id(&self) -> Option<SessionId> {
        self.lock_session().clone()
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Request cancellation of the in-flight run, if any.
    ///
    /// Idempotent: repeated calls, or calls after the run terminated, are
    /// no-ops. The remote cancel is best-effort and its failure is only
    /// logged.
    pub fn cancel(&self) {
        let active = self.lock_active().clone();
        if let Some(state) = active {
            state.request(&self.client);
        }
    }

    /// Run one turn with a single user text message.
    pub async fn run(
        &self,
        input: impl Into<String>,
        observer: &mut dyn RunObserver,
    ) -> ClientResult<RunOutcome> {
        self.run_with_input(vec![InputMessage::user_text(input)], observer)
            .await
    }

    /// Run one turn with explicit input messages.
    pub async fn run_with_input(
        &self,
        input: Vec<InputMessage>,
        observer: &mut dyn RunObserver,
    ) -> ClientResult<RunOutcome> {
        // Caller misuse: reject before any network call.
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return Err(ClientError::RunInProgress);
        }
        let _guard = RunGuard { runner: self };

        let cancel = Arc::new(CancelState::new());
        *self.lock_active() = Some(Arc::clone(&cancel));

        let request = CreateRunRequest {
            agent: self.agent.clone(),
            input,
            mode: RunMode::Stream,
            session_id: self.lock_session().clone(),
        };

        let mut stream = self.transport.open(request, cancel.token()).await?;

        let mut lifecycle = RunLifecycle::new();
        lifecycle.start();
        let mut assembler = MessageAssembler::new();
        let mut transport_error: Option<TransportError> = None;

        while let Some(item) = stream.next().await {
            // Cancellation intent recorded before this item was applied wins
            // over it, terminal events included.
            if cancel.requested() {
                break;
            }
            match item {
                Ok(event) => {
                    observer.on_event(&event);
                    if let RunEvent::RunCreated { run } = &event {
                        cancel.set_run_id(run.run_id.clone());
                        *self.lock_session() = Some(run.session_id.clone());
                        debug!("run {} created on session {}", run.run_id, run.session_id);
                    }
                    lifecycle.apply(&event);
                    match assembler.apply(&event) {
                        Some(AssemblerSignal::Delta(delta)) => observer.on_delta(delta),
                        Some(AssemblerSignal::Artifact(part)) => observer.on_artifact(part),
                        None => {}
                    }
                    if lifecycle.is_terminal() {
                        break;
                    }
                }
                Err(error) => {
                    transport_error = Some(error);
                    break;
                }
            }
        }

        if !lifecycle.is_terminal() {
            if cancel.requested() {
                debug!("run aborted locally before a terminal event");
                lifecycle.cancel_locally();
                assembler.abort();
            } else {
                let error = match transport_error {
                    Some(TransportError::Decode(source)) => RunError::protocol(source.to_string()),
                    _ if !lifecycle.run_created() => RunError::never_created(),
                    Some(source) => RunError::network(source.to_string()),
                    None => RunError::network("stream ended without a terminal event"),
                };
                warn!("run failed locally: {error}");
                lifecycle.fail(error.clone());
                assembler.fail(error);
            }
        }

        let status = lifecycle.status();
        let outcome = RunOutcome {
            run_id: lifecycle.run_id().cloned(),
            session_id: lifecycle.session_id().cloned().or_else(|| self.session_id()),
            status,
            error: lifecycle.error().cloned(),
            message: assembler.into_message(),
        };
        info!(
            "run {} finished: {status}",
            outcome
                .run_id
                .as_ref()
                .map(RunId::as_str)
                .unwrap_or("<never created>")
        );
        Ok(outcome)
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<SessionId>> {
        self.session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<Arc<CancelState>>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight marker and the active cancellation state when a run
/// ends, on every exit path.
struct RunGuard<'a> {
    runner: &'a AgentRunner,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.runner.lock_active() = None;
        self.runner.in_flight.store(false, Ordering::Release);
    }
}
