//! Run lifecycle state machine.

use tether_protocol::{RunError, RunEvent, RunId, RunSnapshot, RunStatus, SessionId};

/// Local view of a run's progress.
///
/// `Idle -> AwaitingCreation -> Streaming -> {Completed | Failed | Cancelled}`.
/// Terminal states are sinks: events that arrive after one (a network
/// buffering race can deliver them) are ignored, not reapplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No invocation started yet.
    Idle,
    /// Request sent, `run.created` not seen.
    AwaitingCreation,
    /// Run identifiers captured, content flowing.
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Tracks one run's status from the event sequence and owns the captured
/// run/session identifiers.
#[derive(Debug)]
pub struct RunLifecycle {
    state: RunState,
    run_id: Option<RunId>,
    session_id: Option<SessionId>,
    error: Option<RunError>,
}

impl RunLifecycle {
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
            run_id: None,
            session_id: None,
            error: None,
        }
    }

    /// Invocation started; the stream is open but `run.created` has not
    /// arrived yet.
    pub fn start(&mut self) {
        if self.state == RunState::Idle {
            self.state = RunState::AwaitingCreation;
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether `run.created` (or any run-bearing event) was observed.
    pub fn run_created(&self) -> bool {
        self.run_id.is_some()
    }

    pub fn run_id(&self) -> Option<&RunId> {
        self.run_id.as_ref()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn error(&self) -> Option<&RunError> {
        self.error.as_ref()
    }

    /// The run status corresponding to the current state.
    pub fn status(&self) -> RunStatus {
        match self.state {
            RunState::Idle | RunState::AwaitingCreation => RunStatus::Created,
            RunState::Streaming => RunStatus::Streaming,
            RunState::Completed => RunStatus::Completed,
            RunState::Failed => RunStatus::Failed,
            RunState::Cancelled => RunStatus::Cancelled,
        }
    }

    /// Apply one event, in arrival order. Returns `false` when the event was
    /// ignored because a terminal state was already reached.
    pub fn apply(&mut self, event: &RunEvent) -> bool {
        if self.is_terminal() {
            return false;
        }

        match event {
            RunEvent::RunCreated { run } => {
                self.capture(run);
                self.state = RunState::Streaming;
            }
            RunEvent::MessagePart { .. } | RunEvent::MessageCompleted | RunEvent::Generic(_) => {}
            RunEvent::RunCompleted { run } => {
                self.capture(run);
                self.state = RunState::Completed;
            }
            RunEvent::RunFailed { run, error } => {
                self.capture(run);
                self.state = RunState::Failed;
                self.error = Some(error.clone());
            }
            RunEvent::RunCancelled { run } => {
                self.capture(run);
                self.state = RunState::Cancelled;
            }
        }
        true
    }

    /// Fail the run from the client side (transport severed, malformed
    /// envelope, run never created). No-op once terminal.
    pub fn fail(&mut self, error: RunError) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = RunState::Failed;
        self.error = Some(error);
        true
    }

    /// Mark the run cancelled locally, without a server acknowledgement.
    /// No-op once terminal; cancellation carries no error.
    pub fn cancel_locally(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.state = RunState::Cancelled;
        true
    }

    fn capture(&mut self, run: &RunSnapshot) {
        if self.run_id.is_none() {
            self.run_id = Some(run.run_id.clone());
        }
        if self.session_id.is_none() {
            self.session_id = Some(run.session_id.clone());
        }
    }
}

impl Default for RunLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
