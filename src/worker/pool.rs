use crate::Result;
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A live handler unit tracked by the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerHandle {
    pub id: u64,
    pub started_at: Instant,
}

/// Outcome of [`WorkerPool::submit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The task is running on its own unit
    Accepted(WorkerHandle),
    /// `max_workers` units are already live; the task was not started
    Saturated,
    /// The pool is terminating and no longer starts units
    Closed,
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Submission::Accepted(_))
    }
}

/// Bounded set of concurrently running handler tasks
///
/// Owned by the reactor, which is the only caller of `submit` and
/// `reap_completed`, so no locking is involved. Completed tasks are not
/// removed until the reactor reaps them; until then they still count
/// against the ceiling.
///
/// # Examples
///
/// ```no_run
/// use udplogd::worker::WorkerPool;
///
/// #[tokio::main]
/// async fn main() {
///     let mut pool = WorkerPool::new(2);
///     let submission = pool.submit(async { Ok(()) });
///     assert!(submission.is_accepted());
///
///     tokio::time::sleep(std::time::Duration::from_millis(10)).await;
///     pool.reap_completed();
///     assert_eq!(pool.active(), 0);
/// }
/// ```
pub struct WorkerPool {
    max_workers: usize,
    tasks: JoinSet<()>,
    live: HashMap<Id, WorkerHandle>,
    next_id: u64,
    cancel: CancellationToken,
    closed: bool,
}

impl WorkerPool {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers,
            tasks: JoinSet::new(),
            live: HashMap::new(),
            next_id: 1,
            cancel: CancellationToken::new(),
            closed: false,
        }
    }

    /// Starts `task` on its own unit unless the pool is full or closed
    ///
    /// A rejected submission has no side effects. Errors returned by the
    /// task are logged and swallowed.
    pub fn submit<F>(&mut self, task: F) -> Submission
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        if self.closed {
            return Submission::Closed;
        }
        if self.live.len() >= self.max_workers {
            return Submission::Saturated;
        }

        let handle = WorkerHandle {
            id: self.next_id,
            started_at: Instant::now(),
        };
        self.next_id += 1;

        let token = self.cancel.child_token();
        let worker = handle.id;
        let abort = self.tasks.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(worker, "Worker cancelled");
                }
                result = task => {
                    if let Err(e) = result {
                        warn!(worker, error = %e, "Handler failed");
                    }
                }
            }
        });
        self.live.insert(abort.id(), handle);

        debug!(worker, active = self.live.len(), "Worker started");
        Submission::Accepted(handle)
    }

    /// Removes every unit that has finished since the last call, without waiting
    ///
    /// Returns the number of units reaped.
    pub fn reap_completed(&mut self) -> usize {
        let mut reaped = 0;
        while let Some(result) = self.tasks.try_join_next_with_id() {
            self.record_completion(result);
            reaped += 1;
        }
        reaped
    }

    /// Asks every live unit to stop and waits at most `grace` for them
    ///
    /// Units still running after the grace period are aborted and
    /// abandoned. The pool admits nothing afterwards. Returns the number
    /// of abandoned units.
    pub async fn terminate_all(&mut self, grace: Duration) -> usize {
        self.closed = true;
        self.cancel.cancel();

        if self.live.is_empty() {
            return 0;
        }

        info!(active = self.live.len(), grace_ms = grace.as_millis(), "Terminating workers");

        if timeout(grace, self.drain()).await.is_ok() {
            return 0;
        }

        let abandoned = self.live.len();
        warn!(abandoned, "Workers still running after grace period, abandoning");
        self.tasks.abort_all();
        self.tasks.detach_all();
        self.live.clear();
        abandoned
    }

    async fn drain(&mut self) {
        while let Some(result) = self.tasks.join_next_with_id().await {
            self.record_completion(result);
        }
    }

    fn record_completion(&mut self, result: std::result::Result<(Id, ()), JoinError>) {
        let id = match result {
            Ok((id, ())) => id,
            Err(e) => {
                if e.is_panic() {
                    error!(error = %e, "Worker panicked");
                }
                e.id()
            }
        };

        if let Some(handle) = self.live.remove(&id) {
            debug!(
                worker = handle.id,
                active = self.live.len(),
                duration_ms = handle.started_at.elapsed().as_millis(),
                "Worker reaped"
            );
        }
    }

    /// Number of live (not yet reaped) units
    pub fn active(&self) -> usize {
        self.live.len()
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
