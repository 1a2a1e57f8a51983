//! Cancellation state for one run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use tether_protocol::RunId;

use crate::client::RunClient;

/// Coordinates local stream teardown with the best-effort remote cancel.
///
/// One instance per run. [`request`](Self::request) is idempotent: the first
/// call sets the cancelled-intent flag, aborts the local transport read, and
/// fires the remote cancel; later calls are no-ops. The intent flag is
/// checked by the event loop before applying each event, which is what makes
/// the cancel-versus-terminal race deterministic.
pub(crate) struct CancelState {
    requested: AtomicBool,
    token: CancellationToken,
    run_id: Mutex<Option<RunId>>,
}

impl CancelState {
    pub fn new() -> Self {
        Self {
            requested: AtomicBool::new(false),
            token: CancellationToken::new(),
            run_id: Mutex::new(None),
        }
    }

    /// Token handed to the transport; triggered on the first `request`.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Whether cancellation intent has been recorded.
    pub fn requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Record the run id once `run.created` arrives, for the remote cancel.
    pub fn set_run_id(&self, run_id: RunId) {
        *self.lock_run_id() = Some(run_id);
    }

    /// Request cancellation. Intent flag first, then the local abort, then
    /// the fire-and-forget remote cancel; remote failures are logged only.
    pub fn request(&self, client: &Arc<RunClient>) {
        if self.requested.swap(true, Ordering::AcqRel) {
            return;
        }
        self.token.cancel();

        let run_id = self.lock_run_id().clone();
        match run_id {
            Some(run_id) => {
                let client = Arc::clone(client);
                tokio::spawn(async move {
                    if let Err(error) = client.cancel_run(&run_id).await {
                        warn!("remote cancel for run {run_id} failed: {error}");
                    }
                });
            }
            None => {
                debug!("cancel requested before the run was created; local abort only");
            }
        }
    }

    fn lock_run_id(&self) -> MutexGuard<'_, Option<RunId>> {
        self.run_id.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
