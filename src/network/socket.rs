// UDP socket binding for the reactor
//
// Sockets are bound through the standard library, switched to non-blocking
// mode and then registered with Tokio. The reactor only ever uses the
// non-blocking `try_recv_from` path after a readiness wakeup, so a socket
// that is not ready never stalls the loop.

use crate::{Result, UdpLogError};
use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// A UDP socket bound on one configured address
///
/// Owned exclusively by the event loop. Dropping it closes the descriptor,
/// and since it is neither `Clone` nor shared, that happens exactly once.
#[derive(Debug)]
pub struct BoundSocket {
    local_addr: SocketAddr,
    socket: UdpSocket,
}

impl BoundSocket {
    /// Binds a non-blocking UDP socket on `addr`
    ///
    /// Port 0 asks the OS for an ephemeral port; the actual address is
    /// available from [`BoundSocket::local_addr`].
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let bind_err = |source| UdpLogError::Bind { addr, source };

        let std_socket = std::net::UdpSocket::bind(addr).map_err(bind_err)?;
        std_socket.set_nonblocking(true).map_err(bind_err)?;
        let local_addr = std_socket.local_addr().map_err(bind_err)?;

        // Registering with the runtime requires a Tokio context
        let socket = UdpSocket::from_std(std_socket).map_err(bind_err)?;

        Ok(Self { local_addr, socket })
    }

    /// Binds every address in order; the first failure drops the sockets bound so far
    pub fn bind_all(addrs: &[SocketAddr]) -> Result<Vec<Self>> {
        if addrs.is_empty() {
            return Err(UdpLogError::Config("no bind addresses configured".into()));
        }
        addrs.iter().map(|addr| Self::bind(*addr)).collect()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Resolves once the socket may have a datagram waiting
    pub async fn readable(&self) -> io::Result<()> {
        self.socket.readable().await
    }

    /// Non-blocking receive; `WouldBlock` means nothing was waiting
    pub fn try_recv_from(&self, buffer: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.try_recv_from(buffer)
    }
}
