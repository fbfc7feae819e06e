use super::config::ServerConfig;
use super::shutdown::{ShutdownController, ShutdownReason};
use super::stats::{Counters, StatsReporter};
use crate::Result;
use crate::logging::shutdown_line;
use crate::network::BoundSocket;
use crate::security::RateLimiter;
use crate::worker::{Packet, PacketHandler, Submission, WorkerPool};
use futures_util::future::select_all;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Reactor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    /// Shutdown requested; tearing down
    Draining,
    Stopped,
}

/// Final figures returned once the reactor has stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownSummary {
    pub counters: Counters,
    pub reason: ShutdownReason,
    /// Workers still running when the grace period ran out
    pub abandoned_workers: usize,
}

/// UDP log server: a single-task reactor over one or more bound sockets
///
/// Every admitted datagram is handed to `H` on its own worker task. The
/// reactor alone owns the sockets, the rate limiter, the worker pool and
/// the counters.
///
/// # Examples
///
/// ```no_run
/// use udplogd::{LogHandler, PacketLog, ServerConfig, UdpLogServer};
///
/// #[tokio::main]
/// async fn main() -> udplogd::Result<()> {
///     let config = ServerConfig::new(vec!["0.0.0.0:9999".parse().unwrap()]);
///     let handler = LogHandler::new(PacketLog::new("./udp_log.txt", None));
///
///     let server = UdpLogServer::bind(config, handler)?;
///     server.shutdown_handle().listen()?;
///
///     let summary = server.run().await?;
///     println!("dropped {}", summary.counters.dropped);
///     Ok(())
/// }
/// ```
pub struct UdpLogServer<H: PacketHandler> {
    config: ServerConfig,
    sockets: Vec<BoundSocket>,
    handler: Arc<H>,
    shutdown: ShutdownController,
}

impl<H: PacketHandler> UdpLogServer<H> {
    /// Binds every configured address; any failure aborts startup
    pub fn bind(config: ServerConfig, handler: H) -> Result<Self> {
        config.validate()?;
        let sockets = BoundSocket::bind_all(&config.bind_addrs)?;

        for socket in &sockets {
            info!(address = %socket.local_addr(), "UDP log server listening");
        }

        Ok(Self {
            config,
            sockets,
            handler: Arc::new(handler),
            shutdown: ShutdownController::new(),
        })
    }

    /// Actual bound addresses, in poll order
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.sockets.iter().map(BoundSocket::local_addr).collect()
    }

    /// Handle that stops the server when a shutdown is requested through it
    pub fn shutdown_handle(&self) -> ShutdownController {
        self.shutdown.clone()
    }

    /// Runs the reactor until a shutdown is requested, then tears down
    pub async fn run(self) -> Result<ShutdownSummary> {
        let mut event_loop = EventLoop::new(self.config, self.sockets, self.handler, self.shutdown);
        event_loop.run().await
    }
}

/// Waits until a socket may be readable, the timeout passes, or a stop is requested
///
/// Returns true only in the first case. `sockets` must not be empty.
async fn poll(
    sockets: &[BoundSocket],
    shutdown: &ShutdownController,
    poll_timeout: Duration,
) -> bool {
    let readiness = select_all(sockets.iter().map(|socket| Box::pin(socket.readable())));

    tokio::select! {
        biased;
        _ = shutdown.requested() => false,
        result = timeout(poll_timeout, readiness) => match result {
            Ok((Ok(()), _, _)) => true,
            Ok((Err(e), index, _)) => {
                debug!(socket = index, error = %e, "Readiness wait failed, retrying");
                false
            }
            Err(_) => false,
        },
    }
}

struct EventLoop<H: PacketHandler> {
    config: ServerConfig,
    sockets: Vec<BoundSocket>,
    handler: Arc<H>,
    shutdown: ShutdownController,
    limiter: RateLimiter,
    pool: WorkerPool,
    stats: StatsReporter,
    counters: Counters,
    buffer: Vec<u8>,
    state: LoopState,
}

impl<H: PacketHandler> EventLoop<H> {
    fn new(
        config: ServerConfig,
        sockets: Vec<BoundSocket>,
        handler: Arc<H>,
        shutdown: ShutdownController,
    ) -> Self {
        Self {
            limiter: RateLimiter::new(config.rate_limit),
            pool: WorkerPool::new(config.max_workers),
            stats: StatsReporter::new(config.stats_interval, Instant::now()),
            counters: Counters::default(),
            buffer: vec![0; config.max_datagram_size],
            state: LoopState::Running,
            config,
            sockets,
            handler,
            shutdown,
        }
    }

    async fn run(&mut self) -> Result<ShutdownSummary> {
        while self.state == LoopState::Running {
            if poll(&self.sockets, &self.shutdown, self.config.poll_timeout).await {
                self.receive_all();
            }

            if let Some(line) = self.stats.tick(Instant::now(), &self.counters) {
                self.publish(line);
            }
            self.pool.reap_completed();

            if self.shutdown.is_requested() {
                self.state = LoopState::Draining;
            }
        }

        Ok(self.teardown().await)
    }

    /// One non-blocking receive per socket, in bind order
    fn receive_all(&mut self) {
        for index in 0..self.sockets.len() {
            let received = self.sockets[index].try_recv_from(&mut self.buffer);
            self.on_receive(index, received);
        }
    }

    /// Empty datagrams and failed receives are skipped without touching the counters
    fn on_receive(&mut self, index: usize, received: io::Result<(usize, SocketAddr)>) {
        match received {
            Ok((0, _)) => {}
            Ok((n, source)) => {
                self.counters.total += 1;
                self.admit(n, source);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => {
                debug!(socket = index, error = %e, "Receive failed, skipping");
            }
        }
    }

    fn admit(&mut self, n: usize, source: SocketAddr) {
        let admission = self.limiter.admit(source.ip(), Instant::now());
        if !admission.is_accepted() {
            self.counters.dropped += 1;
            warn!(
                %source,
                count = admission.count(),
                limit = self.config.rate_limit.limit,
                "Rate limit exceeded, dropping packet"
            );
            return;
        }

        let packet = Packet::new(source, &self.buffer[..n]);
        let handler = Arc::clone(&self.handler);
        match self.pool.submit(async move { handler.handle(packet).await }) {
            Submission::Accepted(worker) => {
                debug!(%source, size = n, worker = worker.id, "Dispatched datagram");
            }
            Submission::Saturated => {
                self.counters.skipped += 1;
                warn!(
                    %source,
                    active = self.pool.active(),
                    limit = self.pool.max_workers(),
                    "Worker pool saturated, skipping packet"
                );
            }
            // Stands in for a failed spawn; the pool only closes during teardown
            Submission::Closed => {
                debug!(%source, "Worker pool closed, discarding packet");
            }
        }
    }

    /// Hands a stats line to the handler without stalling the reactor
    fn publish(&self, line: String) {
        let handler = Arc::clone(&self.handler);
        tokio::spawn(async move {
            if let Err(e) = handler.summary(line).await {
                warn!(error = %e, "Failed to record stats line");
            }
        });
    }

    async fn teardown(&mut self) -> ShutdownSummary {
        let reason = self.shutdown.reason().unwrap_or(ShutdownReason::Requested);
        let line = shutdown_line(self.counters.dropped, self.counters.skipped);
        info!(
            %reason,
            dropped = self.counters.dropped,
            skipped = self.counters.skipped,
            total = self.counters.total,
            "{line}"
        );

        let abandoned_workers = self.pool.terminate_all(self.config.grace_period).await;
        self.pool.reap_completed();

        let handler = Arc::clone(&self.handler);
        if let Err(e) = handler.summary(line).await {
            warn!(error = %e, "Failed to record shutdown line");
        }

        let closed = self.sockets.len();
        self.sockets.clear();
        info!(sockets = closed, "Sockets closed");

        self.state = LoopState::Stopped;
        info!("UDP log server stopped");

        ShutdownSummary {
            counters: self.counters,
            reason,
            abandoned_workers,
        }
    }
}
