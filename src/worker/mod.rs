//! Bounded-concurrency dispatch of packet handlers
//!
//! The reactor hands every admitted datagram to a [`WorkerPool`], which
//! runs it on its own Tokio task through a [`PacketHandler`]. The pool never
//! queues: once `max_workers` units are live, further submissions are
//! rejected and the caller counts them.

pub mod handler;
pub mod pool;

pub use handler::{Packet, PacketHandler};
pub use pool::{Submission, WorkerHandle, WorkerPool};
