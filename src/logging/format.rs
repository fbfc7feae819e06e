use crate::worker::Packet;

/// Timestamp layout used at the start of every packet line
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `[<timestamp>] <ip>:<port> (<n> bytes): <trimmed payload>`
pub fn packet_line(packet: &Packet) -> String {
    format!(
        "[{}] {}:{} ({} bytes): {}",
        packet.received_at.format(TIMESTAMP_FORMAT),
        packet.source.ip(),
        packet.source.port(),
        packet.len(),
        packet.trimmed_payload()
    )
}

/// Periodic summary of rejected traffic
pub fn stats_line(dropped: u64, skipped: u64) -> String {
    format!("[STATS] Dropped packets: {dropped}, Skipped forks: {skipped}")
}

/// Final totals written once the reactor stops
pub fn shutdown_line(dropped: u64, skipped: u64) -> String {
    format!("Shutting down. Total dropped packets: {dropped}, total skipped forks: {skipped}")
}
