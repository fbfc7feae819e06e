use crate::network::interface_addresses;
use crate::security::RateLimitConfig;
use crate::{Result, UdpLogError};
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_PORT: u16 = 9999;
pub const DEFAULT_LOGFILE: &str = "./udp_log.txt";
pub const DEFAULT_RATE_LIMIT: u32 = 10;
pub const DEFAULT_WINDOW_SECS: u64 = 10;
pub const DEFAULT_MAX_WORKERS: usize = 50;
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 200;
pub const DEFAULT_STATS_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 500;
pub const MAX_DATAGRAM_SIZE: usize = 65535;

/// Configuration for the UDP log server
///
/// # Examples
///
/// ```
/// use udplogd::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::new(vec!["127.0.0.1:9999".parse().unwrap()])
///     .with_rate_limit(3, Duration::from_secs(10))
///     .with_max_workers(8);
///
/// assert_eq!(config.max_workers, 8);
/// assert_eq!(config.poll_timeout, Duration::from_millis(200));
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Addresses to bind, drained in this order every poll cycle
    pub bind_addrs: Vec<SocketAddr>,
    /// Per-source fixed window
    pub rate_limit: RateLimitConfig,
    /// Ceiling on concurrently live handler units
    pub max_workers: usize,
    /// Upper bound on one readiness wait
    pub poll_timeout: Duration,
    /// Minimum spacing between stats lines
    pub stats_interval: Duration,
    /// How long terminating workers get before they are abandoned
    pub grace_period: Duration,
    /// Receive buffer size
    pub max_datagram_size: usize,
}

impl ServerConfig {
    pub fn new(bind_addrs: Vec<SocketAddr>) -> Self {
        Self {
            bind_addrs,
            rate_limit: RateLimitConfig {
                limit: DEFAULT_RATE_LIMIT,
                window: Duration::from_secs(DEFAULT_WINDOW_SECS),
            },
            max_workers: DEFAULT_MAX_WORKERS,
            poll_timeout: Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
            stats_interval: Duration::from_secs(DEFAULT_STATS_INTERVAL_SECS),
            grace_period: Duration::from_millis(DEFAULT_GRACE_PERIOD_MS),
            max_datagram_size: MAX_DATAGRAM_SIZE,
        }
    }

    pub fn with_rate_limit(mut self, limit: u32, window: Duration) -> Self {
        self.rate_limit = RateLimitConfig { limit, window };
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Rejects values the reactor cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.bind_addrs.is_empty() {
            return Err(UdpLogError::Config("no bind addresses configured".into()));
        }
        if self.max_workers == 0 {
            return Err(UdpLogError::Config("max_workers must be at least 1".into()));
        }
        if self.rate_limit.limit == 0 {
            return Err(UdpLogError::Config("rate limit must be at least 1".into()));
        }
        if self.poll_timeout.is_zero() {
            return Err(UdpLogError::Config("poll timeout must be positive".into()));
        }
        if self.max_datagram_size == 0 {
            return Err(UdpLogError::Config("datagram buffer must be non-empty".into()));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(vec![SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT))])
    }
}

/// Verbosity accepted by the `loglevel` option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
}

impl FromStr for LogLevel {
    type Err = UdpLogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            other => Err(UdpLogError::Config(format!("unknown log level: {other}"))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
        };
        f.write_str(name)
    }
}

/// Raw option values as given on the command line
///
/// Numeric values stay strings until [`Options::resolve`], so a bad value
/// can fall back to its default instead of aborting startup.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub hosts: Vec<String>,
    pub iface: Option<String>,
    pub port: Option<String>,
    pub logfile: Option<PathBuf>,
    pub logrotate: Option<String>,
    pub ratelimit: Option<String>,
    pub window: Option<String>,
    pub maxforks: Option<String>,
    pub timeout: Option<String>,
    pub stats_interval: Option<String>,
}

/// Everything needed to start the server and its packet log
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub logfile: PathBuf,
    pub logrotate: Option<u64>,
}

impl Options {
    /// Validates the options, resolving hosts and interfaces to bind addresses
    ///
    /// Invalid numeric values are replaced by their defaults with a warning.
    /// Unresolvable hosts or interfaces are errors.
    pub fn resolve(&self) -> Result<Settings> {
        let port = positive("port", self.port.as_deref(), DEFAULT_PORT);
        let bind_addrs = self.bind_addrs(port)?;

        let limit = positive("ratelimit", self.ratelimit.as_deref(), DEFAULT_RATE_LIMIT);
        let window = positive("window", self.window.as_deref(), DEFAULT_WINDOW_SECS);
        let max_workers = positive("maxforks", self.maxforks.as_deref(), DEFAULT_MAX_WORKERS);
        let timeout = positive("timeout", self.timeout.as_deref(), DEFAULT_POLL_TIMEOUT_MS);
        let stats_interval = positive(
            "stats-interval",
            self.stats_interval.as_deref(),
            DEFAULT_STATS_INTERVAL_SECS,
        );

        let server = ServerConfig::new(bind_addrs)
            .with_rate_limit(limit, Duration::from_secs(window))
            .with_max_workers(max_workers)
            .with_poll_timeout(Duration::from_millis(timeout))
            .with_stats_interval(Duration::from_secs(stats_interval));

        Ok(Settings {
            server,
            logfile: self
                .logfile
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOGFILE)),
            logrotate: rotation_limit(self.logrotate.as_deref()),
        })
    }

    fn bind_addrs(&self, port: u16) -> Result<Vec<SocketAddr>> {
        let mut addrs = Vec::new();

        for host in &self.hosts {
            let resolved = (host.as_str(), port).to_socket_addrs().map_err(|e| {
                UdpLogError::Config(format!("cannot resolve host {host}: {e}"))
            })?;
            addrs.extend(resolved);
        }

        if let Some(iface) = &self.iface {
            addrs.extend(interface_addresses(iface)?.into_iter().map(|mut addr| {
                addr.set_port(port);
                addr
            }));
        }

        if addrs.is_empty() {
            return Err(UdpLogError::Config(
                "one of host or iface is required".into(),
            ));
        }

        addrs.dedup();
        Ok(addrs)
    }
}

/// Parses a strictly positive number, falling back to `default` with a warning
fn positive<T>(name: &str, raw: Option<&str>, default: T) -> T
where
    T: FromStr + PartialOrd + Default + fmt::Display + Copy,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => value,
        _ => {
            warn!(option = name, value = raw, %default, "Invalid value, using default");
            default
        }
    }
}

/// `logrotate` is a byte count; 0 or absent disables rotation
fn rotation_limit(raw: Option<&str>) -> Option<u64> {
    let raw = raw?;
    match raw.trim().parse::<u64>() {
        Ok(0) => None,
        Ok(limit) => Some(limit),
        Err(_) => {
            warn!(option = "logrotate", value = raw, "Invalid value, rotation disabled");
            None
        }
    }
}
