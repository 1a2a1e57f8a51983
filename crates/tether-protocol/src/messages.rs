//! Request types and message parts.

use serde::{Deserialize, Serialize};

use crate::events::SessionId;

fn is_false(value: &bool) -> bool {
    !*value
}

/// One fragment of a message.
///
/// Non-artifact parts are narrative output and are concatenated, in arrival
/// order, into the assembled message. Artifact parts carry side-channel output
/// such as generated files and must never touch the narrative content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePart {
    pub content: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_artifact: bool,

    /// Artifact filename, when the part represents a file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Media type of the content, e.g. `text/plain`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl MessagePart {
    /// A plain narrative text part.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_artifact: false,
            name: None,
            content_type: None,
        }
    }

    /// A named artifact part.
    pub fn artifact(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_artifact: true,
            name: Some(name.into()),
            content_type: None,
        }
    }
}

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// One input message on a create-run request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputMessage {
    pub role: Role,
    pub parts: Vec<MessagePart>,
}

impl InputMessage {
    /// A user message with a single text part.
    pub fn user_text(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![MessagePart::text(content)],
        }
    }
}

/// How the server should deliver the run result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Server pushes envelopes as they are produced.
    Stream,
    /// Server answers once, after the run finished.
    Sync,
}

/// Body of `POST /runs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRunRequest {
    /// Target agent name.
    pub agent: String,

    pub input: Vec<InputMessage>,

    pub mode: RunMode,

    /// Continuation token from a previous turn. Must be absent, not empty,
    /// on the first turn of a conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl CreateRunRequest {
    /// A streaming run carrying one user text message.
    pub fn user_text(agent: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            input: vec![InputMessage::user_text(content)],
            mode: RunMode::Stream,
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }
}
