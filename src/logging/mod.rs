//! Packet log output
//!
//! Admitted datagrams end up as one line each in a [`PacketLog`] file, next
//! to the reactor's stats and shutdown lines. The line formats live in
//! [`format`] so the reactor and the handlers agree on them.

pub mod format;
pub mod packet_log;

pub use format::{packet_line, shutdown_line, stats_line};
pub use packet_log::{LogHandler, PacketLog};
