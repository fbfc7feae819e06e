use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Local};
use std::net::SocketAddr;
use std::sync::Arc;

/// A received datagram, as handed to a handler unit
///
/// The payload is a cheap reference-counted copy, so the reactor can reuse
/// its receive buffer as soon as the packet is built.
#[derive(Debug, Clone)]
pub struct Packet {
    pub received_at: DateTime<Local>,
    pub source: SocketAddr,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(source: SocketAddr, payload: &[u8]) -> Self {
        Self {
            received_at: Local::now(),
            source,
            payload: Bytes::copy_from_slice(payload),
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Payload decoded lossily as UTF-8 with surrounding whitespace removed
    pub fn trimmed_payload(&self) -> String {
        String::from_utf8_lossy(&self.payload).trim().to_string()
    }
}

/// Work performed for each admitted datagram
///
/// Implementations run concurrently on independent tasks and must tolerate
/// being invoked from many of them at once. A returned error is logged by
/// the pool and otherwise ignored.
#[async_trait]
pub trait PacketHandler: Send + Sync + 'static {
    async fn handle(&self, packet: Packet) -> Result<()>;

    /// Records a reactor summary line (stats, shutdown totals); discarded by default
    async fn summary(&self, _line: String) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<H: PacketHandler + ?Sized> PacketHandler for Arc<H> {
    async fn handle(&self, packet: Packet) -> Result<()> {
        (**self).handle(packet).await
    }

    async fn summary(&self, line: String) -> Result<()> {
        (**self).summary(line).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trimmed_payload() {
        let packet = Packet::new("10.0.0.1:4000".parse().unwrap(), b"  hello world\r\n");
        assert_eq!(packet.len(), 15);
        assert_eq!(packet.trimmed_payload(), "hello world");
    }

    #[test]
    fn test_trimmed_payload_lossy() {
        let packet = Packet::new("10.0.0.1:4000".parse().unwrap(), &[0x66, 0xff, 0x6f, b'\n']);
        assert_eq!(packet.trimmed_payload(), "f\u{fffd}o");
    }
}
