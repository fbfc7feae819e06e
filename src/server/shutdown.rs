//! Cooperative shutdown
//!
//! Signals never do any teardown themselves. The listener task only records
//! the first reason and cancels a token; the reactor notices at its next
//! iteration boundary and performs the teardown on its own task.

use crate::{Result, UdpLogError};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Why the server is stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT
    Interrupt,
    /// SIGTERM
    Terminate,
    /// Requested through a [`ShutdownController`] handle
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShutdownReason::Interrupt => "SIGINT",
            ShutdownReason::Terminate => "SIGTERM",
            ShutdownReason::Requested => "shutdown request",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
struct ShutdownState {
    reason: OnceLock<ShutdownReason>,
    token: CancellationToken,
}

/// Shared stop flag; clones observe the same state
#[derive(Debug, Clone, Default)]
pub struct ShutdownController {
    state: Arc<ShutdownState>,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop; only the first reason is kept
    ///
    /// Returns true if this call was the one that set it.
    pub fn request(&self, reason: ShutdownReason) -> bool {
        let first = self.state.reason.set(reason).is_ok();
        self.state.token.cancel();
        first
    }

    pub fn is_requested(&self) -> bool {
        self.state.reason.get().is_some()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.state.reason.get().copied()
    }

    /// Resolves once a stop has been requested
    pub async fn requested(&self) {
        self.state.token.cancelled().await
    }

    /// Routes SIGINT and SIGTERM into [`ShutdownController::request`]
    ///
    /// Handlers are installed before this returns, so a signal arriving
    /// right after cannot kill the process. The spawned task ends after
    /// the first signal or request.
    pub fn listen(&self) -> Result<JoinHandle<()>> {
        let mut interrupt = signal(SignalKind::interrupt()).map_err(UdpLogError::Io)?;
        let mut terminate = signal(SignalKind::terminate()).map_err(UdpLogError::Io)?;
        let controller = self.clone();

        Ok(tokio::spawn(async move {
            let reason = tokio::select! {
                _ = interrupt.recv() => ShutdownReason::Interrupt,
                _ = terminate.recv() => ShutdownReason::Terminate,
                _ = controller.requested() => return,
            };
            controller.request(reason);
        }))
    }
}
