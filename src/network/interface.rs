// Interface address discovery
//
// Resolves the addresses assigned to a named network interface with
// getifaddrs(3). Only AF_INET and AF_INET6 entries are returned; link-layer
// and other families on the same interface are skipped. IPv6 entries keep
// their scope id, which the kernel requires to bind a link-local address.

use crate::{Result, UdpLogError};
use std::ffi::CStr;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

/// Returns every socket address currently assigned to `name`, in kernel order
///
/// Ports are 0; callers set the port they want to bind.
pub fn interface_addresses(name: &str) -> Result<Vec<SocketAddr>> {
    let addresses: Vec<SocketAddr> = all_interface_addresses()?
        .into_iter()
        .filter(|(entry, _)| entry == name)
        .map(|(_, addr)| addr)
        .collect();

    if addresses.is_empty() {
        return Err(UdpLogError::Interface(format!(
            "no IP addresses found for interface {name}"
        )));
    }
    Ok(addresses)
}

/// Every (interface name, address) pair on the host
fn all_interface_addresses() -> Result<Vec<(String, SocketAddr)>> {
    let mut head: *mut libc::ifaddrs = std::ptr::null_mut();

    // Safety: getifaddrs either fails or hands us a list we free below
    let result = unsafe { libc::getifaddrs(&mut head) };
    if result != 0 {
        return Err(UdpLogError::Interface(format!(
            "getifaddrs failed: {}",
            std::io::Error::last_os_error()
        )));
    }

    let mut entries = Vec::new();
    let mut cursor = head;
    while !cursor.is_null() {
        // Safety: cursor walks the list returned by getifaddrs, which stays valid until freeifaddrs
        let entry = unsafe { &*cursor };
        cursor = entry.ifa_next;

        if entry.ifa_addr.is_null() || entry.ifa_name.is_null() {
            continue;
        }
        // Safety: ifa_name is a non-null, NUL-terminated string owned by the list
        let name = unsafe { CStr::from_ptr(entry.ifa_name) };
        // Safety: ifa_addr is non-null and its storage matches sa_family
        if let Some(addr) = unsafe { sockaddr_to_socket_addr(entry.ifa_addr) } {
            entries.push((name.to_string_lossy().into_owned(), addr));
        }
    }

    // Safety: head came from a successful getifaddrs and is freed exactly once
    unsafe { libc::freeifaddrs(head) };

    Ok(entries)
}

/// # Safety
/// `addr` must point to a valid sockaddr whose storage matches its family.
unsafe fn sockaddr_to_socket_addr(addr: *const libc::sockaddr) -> Option<SocketAddr> {
    let family = unsafe { (*addr).sa_family } as libc::c_int;
    match family {
        libc::AF_INET => {
            let v4 = unsafe { &*(addr as *const libc::sockaddr_in) };
            let ip = Ipv4Addr::from(u32::from_be(v4.sin_addr.s_addr));
            Some(SocketAddr::V4(SocketAddrV4::new(ip, 0)))
        }
        libc::AF_INET6 => {
            let v6 = unsafe { &*(addr as *const libc::sockaddr_in6) };
            let ip = Ipv6Addr::from(v6.sin6_addr.s6_addr);
            Some(SocketAddr::V6(SocketAddrV6::new(ip, 0, 0, v6.sin6_scope_id)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::BoundSocket;
    use std::io;

    #[test]
    fn test_loopback_has_addresses() {
        let name = if cfg!(target_os = "linux") { "lo" } else { "lo0" };
        let addrs = interface_addresses(name).unwrap();
        assert!(addrs.iter().any(|addr| addr.ip().is_loopback()));
        assert!(addrs.iter().all(|addr| addr.port() == 0));
    }

    #[test]
    fn test_unknown_interface_is_error() {
        let err = interface_addresses("udplogd-no-such-if0").unwrap_err();
        assert!(matches!(err, UdpLogError::Interface(_)));
    }

    #[test]
    fn test_link_local_keeps_scope_id() {
        for (_, addr) in all_interface_addresses().unwrap() {
            if let SocketAddr::V6(v6) = addr {
                if v6.ip().segments()[0] & 0xffc0 == 0xfe80 {
                    assert_ne!(v6.scope_id(), 0, "{addr} has no scope id");
                }
            }
        }
    }

    #[tokio::test]
    async fn test_every_interface_address_binds() {
        let entries = all_interface_addresses().unwrap();
        let mut names: Vec<&str> = entries.iter().map(|(name, _)| name.as_str()).collect();
        names.dedup();

        let mut bound = 0;
        for name in names {
            for addr in interface_addresses(name).unwrap() {
                match BoundSocket::bind(addr) {
                    Ok(_) => bound += 1,
                    // Addresses still in duplicate address detection cannot be bound yet
                    Err(UdpLogError::Bind { source, .. })
                        if source.kind() == io::ErrorKind::AddrNotAvailable => {}
                    Err(e) => panic!("{name}: {addr}: {e}"),
                }
            }
        }
        assert!(bound > 0);
    }
}
