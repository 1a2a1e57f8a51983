//! Server-pushed event envelopes.
//!
//! Events form a state machine: a run moves from created to streaming to
//! exactly one terminal state, and every envelope a server emits maps onto one
//! [`RunEvent`] variant. Unrecognized envelope types are preserved as
//! [`RunEvent::Generic`] so newer servers can ship event types older clients
//! simply pass through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::messages::MessagePart;

// ============================================================================
// Identifiers
// ============================================================================

/// Opaque server-issued run identifier. Unique per turn; used only for
/// cancellation and one-shot status reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Opaque server-issued session identifier. Reused across turns of one
/// conversation to preserve server-side context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ============================================================================
// Run state
// ============================================================================

/// Server-side run status. Monotonic: a run never moves back to an earlier
/// status, and the three terminal statuses are sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Created,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Whether no further status transition can occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A run record as carried on lifecycle envelopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: RunId,
    pub session_id: SessionId,
    pub status: RunStatus,

    /// Error attached by the server when the run failed. Some servers embed
    /// it here rather than (or in addition to) the event-level field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Errors
// ============================================================================

/// A classified run error: a machine-readable code plus a human-readable
/// message. Server-emitted codes are carried through verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub code: String,
    pub message: String,
}

impl RunError {
    /// Connection severed before a terminal event was observed.
    pub const NETWORK_ERROR: &'static str = "network_error";
    /// Malformed envelope on the stream; not retried.
    pub const PROTOCOL_ERROR: &'static str = "protocol_error";
    /// Stream ended before `run.created` arrived.
    pub const NEVER_CREATED: &'static str = "never_created";
    /// Generic server-side failure.
    pub const SERVER_ERROR: &'static str = "server_error";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(Self::NETWORK_ERROR, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(Self::PROTOCOL_ERROR, message)
    }

    pub fn never_created() -> Self {
        Self::new(
            Self::NEVER_CREATED,
            "stream ended before the run was created",
        )
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(Self::SERVER_ERROR, message)
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

// ============================================================================
// Event envelope
// ============================================================================

/// One decoded envelope from the run stream, tagged by the wire `type` field
/// with its payload under `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RunEvent {
    /// First event of every stream. Carries the identifiers the client needs
    /// for cancellation and session continuation.
    #[serde(rename = "run.created")]
    RunCreated { run: RunSnapshot },

    /// One content fragment. Artifact parts are side-channel output and are
    /// never concatenated into the narrative message.
    #[serde(rename = "message.part")]
    MessagePart { part: MessagePart },

    /// The current message is complete. A run may contain several messages,
    /// so this does not end the run.
    #[serde(rename = "message.completed")]
    MessageCompleted,

    /// Terminal: the run finished normally.
    #[serde(rename = "run.completed")]
    RunCompleted { run: RunSnapshot },

    /// Terminal: the server failed the run.
    #[serde(rename = "run.failed")]
    RunFailed { run: RunSnapshot, error: RunError },

    /// Terminal: the server acknowledged cancellation.
    #[serde(rename = "run.cancelled")]
    RunCancelled { run: RunSnapshot },

    /// Forward-compatible catch-all for envelope types this client does not
    /// understand. The raw `data` payload is preserved verbatim.
    #[serde(rename = "generic")]
    Generic(Value),
}

impl RunEvent {
    /// Whether this event ends the run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::RunCompleted { .. } | Self::RunFailed { .. } | Self::RunCancelled { .. }
        )
    }

    /// The wire discriminator for this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunCreated { .. } => "run.created",
            Self::MessagePart { .. } => "message.part",
            Self::MessageCompleted => "message.completed",
            Self::RunCompleted { .. } => "run.completed",
            Self::RunFailed { .. } => "run.failed",
            Self::RunCancelled { .. } => "run.cancelled",
            Self::Generic(_) => "generic",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(status: RunStatus) -> RunSnapshot {
        RunSnapshot {
            run_id: RunId::from("run-1"),
            session_id: SessionId::from("sess-1"),
            status,
            error: None,
            created_at: None,
            finished_at: None,
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!RunStatus::Created.is_terminal());
        assert!(!RunStatus::Streaming.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = RunEvent::RunCreated {
            run: snapshot(RunStatus::Created),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "run.created");
        assert_eq!(value["data"]["run"]["run_id"], "run-1");
        assert_eq!(value["data"]["run"]["session_id"], "sess-1");
        assert_eq!(value["data"]["run"]["status"], "created");
    }

    #[test]
    fn test_message_completed_serializes_without_payload() {
        let value = serde_json::to_value(RunEvent::MessageCompleted).unwrap();
        assert_eq!(value["type"], "message.completed");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_terminal_events() {
        assert!(
            RunEvent::RunCompleted {
                run: snapshot(RunStatus::Completed)
            }
            .is_terminal()
        );
        assert!(!RunEvent::MessageCompleted.is_terminal());
        assert!(!RunEvent::Generic(serde_json::json!({})).is_terminal());
    }
}
