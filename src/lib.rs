use std::net::SocketAddr;
use thiserror::Error;

/// Error types for the udplogd library
#[derive(Error, Debug)]
pub enum UdpLogError {
    /// A configured address could not be bound (fatal at startup)
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// File and other I/O errors (packet log)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network interface lookup errors
    #[error("Interface error: {0}")]
    Interface(String),

    /// Errors raised by a packet handler
    #[error("Handler error: {0}")]
    Handler(String),
}

/// Result type for the udplogd library
pub type Result<T> = std::result::Result<T, UdpLogError>;

pub mod logging;
pub mod network;
pub mod security;
pub mod server;
pub mod worker;

// Re-export main types for convenience
pub use logging::{LogHandler, PacketLog};
pub use network::BoundSocket;
pub use security::{Admission, RateLimiter};
pub use server::{
    Counters, ServerConfig, ShutdownController, ShutdownReason, ShutdownSummary, StatsReporter,
    UdpLogServer,
};
pub use worker::{Packet, PacketHandler, Submission, WorkerHandle, WorkerPool};
