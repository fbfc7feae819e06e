//! Socket binding and interface address discovery

pub mod interface;
pub mod socket;

pub use interface::interface_addresses;
pub use socket::BoundSocket;
