//! The reactor and the pieces it drives
//!
//! [`UdpLogServer`] binds the configured sockets and runs the event loop:
//! wait for readiness, receive, rate-limit, dispatch to the worker pool,
//! tick the [`StatsReporter`], reap finished workers, and check the
//! [`ShutdownController`].

pub mod config;
pub mod event_loop;
pub mod shutdown;
pub mod stats;


pub use config::{LogLevel, Options, ServerConfig, Settings};
pub use event_loop::{LoopState, ShutdownSummary, UdpLogServer};
pub use shutdown::{ShutdownController, ShutdownReason};
pub use stats::{Counters, StatsReporter};
