//! Admission control for incoming datagrams

pub mod rate_limit;

pub use rate_limit::{Admission, RateLimitConfig, RateLimiter};
