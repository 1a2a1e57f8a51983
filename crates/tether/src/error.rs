//! Client error types.
//!
//! These are the errors a caller can get back from the library surface.
//! Failures *of a run* are not errors at this level: they are recorded on the
//! [`RunOutcome`](crate::run::RunOutcome) as a classified
//! [`RunError`](tether_protocol::RunError), so a bad event can never corrupt
//! the ordered processing of an otherwise-recoverable partial result.

use thiserror::Error;

use crate::transport::TransportError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the client API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A second run was started on a runner whose previous run has not
    /// terminated. This is caller misuse and fails before any network call.
    #[error("a run is already in flight for this conversation")]
    RunInProgress,

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered a unary call with an error.
    #[error("agent API error: {message} (code: {code})")]
    Api { code: String, message: String },

    /// The run stream could not be established.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Failed to parse a response body.
    #[error("failed to parse response: {0}")]
    Parse(String),
}
