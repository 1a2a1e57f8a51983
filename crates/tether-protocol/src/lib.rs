//! Wire types for the agent-run streaming protocol.
//!
//! A run is created with a single POST request and answered with a stream of
//! discrete envelopes, each tagged with a `type` discriminator and carrying a
//! `data` payload:
//!
//! ```text
//! Caller --[CreateRunRequest]--> Server
//! Caller <--[run.created]------- Server
//! Caller <--[message.part]*----- Server
//! Caller <--[message.completed]* Server
//! Caller <--[run.completed |     Server
//!            run.failed |
//!            run.cancelled]
//! ```
//!
//! Exactly one `run.created` opens the stream and exactly one terminal event
//! closes it; content-bearing events occur strictly between them. This crate
//! defines the envelope types, the request types, and the codec that turns one
//! raw envelope into a typed [`RunEvent`]. It performs no I/O.

pub mod codec;
pub mod events;
pub mod messages;

pub use codec::{DecodeError, decode_envelope};
pub use events::{RunError, RunEvent, RunId, RunSnapshot, RunStatus, SessionId};
pub use messages::{CreateRunRequest, InputMessage, MessagePart, Role, RunMode};
