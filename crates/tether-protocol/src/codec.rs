//! Envelope codec.
//!
//! Decodes one complete envelope into a [`RunEvent`]. Framing (reassembling
//! a chunked byte stream into discrete envelopes) is the transport's job;
//! this codec sees exactly one envelope per call and never reorders or drops.
//!
//! Known envelope types decode strictly: a payload that does not match its
//! schema is a [`DecodeError`], and a single run's stream is unrecoverable
//! after that (no resynchronization is attempted). Unknown types decode as
//! [`RunEvent::Generic`] so the client keeps working against newer servers.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::events::{RunError, RunEvent, RunSnapshot};
use crate::messages::MessagePart;

/// Errors produced while decoding a single envelope.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The envelope is not valid JSON.
    #[error("envelope is not valid JSON: {0}")]
    Syntax(#[source] serde_json::Error),

    /// The envelope has no `type` discriminator.
    #[error("envelope has no `type` field")]
    MissingType,

    /// A known envelope type carried a payload that does not match its schema.
    #[error("malformed `{event_type}` payload: {source}")]
    Payload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(serde::Deserialize)]
struct RunPayload {
    run: RunSnapshot,
}

#[derive(serde::Deserialize)]
struct FailedPayload {
    run: RunSnapshot,
    #[serde(default)]
    error: Option<RunError>,
}

#[derive(serde::Deserialize)]
struct PartPayload {
    part: MessagePart,
}

/// Decode one raw envelope into a typed event.
pub fn decode_envelope(raw: &str) -> Result<RunEvent, DecodeError> {
    let value: Value = serde_json::from_str(raw).map_err(DecodeError::Syntax)?;

    let Some(event_type) = value.get("type").and_then(|v| v.as_str()) else {
        return Err(DecodeError::MissingType);
    };
    let event_type = event_type.to_string();
    let data = value.get("data").cloned().unwrap_or(Value::Null);

    let event = match event_type.as_str() {
        "run.created" => {
            let payload: RunPayload = payload(&event_type, data)?;
            RunEvent::RunCreated { run: payload.run }
        }
        "message.part" => {
            let payload: PartPayload = payload(&event_type, data)?;
            RunEvent::MessagePart { part: payload.part }
        }
        "message.completed" => RunEvent::MessageCompleted,
        "run.completed" => {
            let payload: RunPayload = payload(&event_type, data)?;
            RunEvent::RunCompleted { run: payload.run }
        }
        "run.failed" => {
            let payload: FailedPayload = payload(&event_type, data)?;
            // Some servers attach the error to the run record instead of the
            // envelope. Prefer the envelope-level error when both are present.
            let error = payload
                .error
                .or_else(|| payload.run.error.clone())
                .unwrap_or_else(|| RunError::server("agent run failed"));
            RunEvent::RunFailed {
                run: payload.run,
                error,
            }
        }
        "run.cancelled" => {
            let payload: RunPayload = payload(&event_type, data)?;
            RunEvent::RunCancelled { run: payload.run }
        }
        // "generic" and anything this client does not recognize.
        _ => RunEvent::Generic(data),
    };

    Ok(event)
}

fn payload<T: DeserializeOwned>(event_type: &str, data: Value) -> Result<T, DecodeError> {
    serde_json::from_value(data).map_err(|source| DecodeError::Payload {
        event_type: event_type.to_string(),
        source,
    })
}
