//! Message assembler.

use tether_protocol::{MessagePart, RunError, RunEvent};

/// Status of the message being assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    InProgress,
    Completed,
    Failed,
    Aborted,
}

impl MessageStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// The assistant message reconstructed from stream fragments.
///
/// Mutated only by applying events in arrival order; immutable once the
/// status reaches a terminal value. Partial content survives failure and
/// cancellation.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledMessage {
    pub content: String,
    pub status: MessageStatus,
    pub error: Option<RunError>,
}

/// What an applied event produced, for forwarding to the observer.
#[derive(Debug, PartialEq)]
pub enum AssemblerSignal<'a> {
    /// Narrative content that was appended to the message.
    Delta(&'a str),
    /// Side-channel output; never part of the message content.
    Artifact(&'a MessagePart),
}

/// Builds one [`AssembledMessage`] from content-bearing events.
#[derive(Debug)]
pub struct MessageAssembler {
    message: AssembledMessage,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self {
            message: AssembledMessage {
                content: String::new(),
                status: MessageStatus::InProgress,
                error: None,
            },
        }
    }

    pub fn message(&self) -> &AssembledMessage {
        &self.message
    }

    pub fn into_message(self) -> AssembledMessage {
        self.message
    }

    /// Apply one event in arrival order.
    ///
    /// Non-artifact parts append verbatim; the protocol guarantees each part
    /// is a distinct delta, so identical consecutive parts are appended, not
    /// deduplicated. Artifact parts are handed back for the side channel and
    /// never touch the content.
    pub fn apply<'a>(&mut self, event: &'a RunEvent) -> Option<AssemblerSignal<'a>> {
        match event {
            RunEvent::MessagePart { part } if part.is_artifact => {
                Some(AssemblerSignal::Artifact(part))
            }
            RunEvent::MessagePart { part } => {
                if self.message.status.is_terminal() {
                    return None;
                }
                self.message.content.push_str(&part.content);
                Some(AssemblerSignal::Delta(&part.content))
            }
            RunEvent::MessageCompleted => {
                // Does not end the run: a run may carry several messages.
                if !self.message.status.is_terminal() {
                    self.message.status = MessageStatus::Completed;
                }
                None
            }
            RunEvent::RunFailed { error, .. } => {
                self.fail(error.clone());
                None
            }
            RunEvent::RunCancelled { .. } => {
                self.abort();
                None
            }
            RunEvent::RunCreated { .. } | RunEvent::RunCompleted { .. } | RunEvent::Generic(_) => {
                None
            }
        }
    }

    /// Mark the message failed, preserving accumulated content. No-op once
    /// the message reached a terminal status.
    pub fn fail(&mut self, error: RunError) {
        if self.message.status.is_terminal() {
            return;
        }
        self.message.status = MessageStatus::Failed;
        self.message.error = Some(error);
    }

    /// Mark the message aborted by the user, preserving accumulated content.
    /// No-op once the message reached a terminal status.
    pub fn abort(&mut self) {
        if self.message.status.is_terminal() {
            return;
        }
        self.message.status = MessageStatus::Aborted;
    }
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new()
    }
}
