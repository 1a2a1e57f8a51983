//! Client for the agent-run streaming protocol.
//!
//! One invocation of a remote agent is a *run*: a single POST opens a stream
//! of server-pushed envelopes describing the run's lifecycle and incremental
//! output, and this crate reconstructs a coherent assistant message from the
//! fragments.
//!
//! ```text
//! Caller -> AgentRunner -> SseTransport -> codec -> RunLifecycle -> MessageAssembler -> RunObserver
//!   |                                                                                      ^
//!   +--- cancel() ---> CancelState ---> transport abort + remote cancel -------------------+
//! ```
//!
//! Events flow one direction and are applied strictly one at a time, in
//! arrival order; cancellation flows the other way and is cooperative. Each
//! run owns its own state machine, assembler, and cancellation state, so
//! parallel conversations share nothing but the HTTP connection pool.

pub mod client;
pub mod error;
pub mod run;
pub mod transport;

pub use client::RunClient;
pub use error::{ClientError, ClientResult};
pub use run::{
    AgentRunner, AssembledMessage, MessageStatus, RunObserver, RunOutcome, RunState,
};
pub use transport::{EventStream, SseTransport, Transport, TransportError};

// Re-export the wire types; callers need them for observers and outcomes.
pub use tether_protocol as protocol;
