use clap::{ArgGroup, Parser};
use color_eyre::eyre::{Result, WrapErr};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use udplogd::server::config::DEFAULT_LOGFILE;
use udplogd::server::{LogLevel, Options, ShutdownSummary};
use udplogd::{LogHandler, PacketLog, UdpLogServer};

#[derive(Parser, Debug)]
#[command(name = "udplogd", author, version, about = "Rate-limited UDP datagram logger")]
#[command(allow_negative_numbers = true)]
#[command(group(ArgGroup::new("bind").required(true).multiple(true).args(["host", "iface"])))]
struct Cli {
    /// Address to bind (repeatable)
    #[arg(long)]
    host: Vec<String>,

    /// Bind every address of this network interface
    #[arg(long)]
    iface: Option<String>,

    /// UDP port [default: 9999]
    #[arg(short, long)]
    port: Option<String>,

    /// Packet log path
    #[arg(long, default_value = DEFAULT_LOGFILE)]
    logfile: PathBuf,

    /// Rotate the packet log once it would exceed this many bytes
    #[arg(long)]
    logrotate: Option<String>,

    /// Packets per source per window [default: 10]
    #[arg(long)]
    ratelimit: Option<String>,

    /// Rate limit window in seconds [default: 10]
    #[arg(long)]
    window: Option<String>,

    /// Maximum concurrent handlers [default: 50]
    #[arg(long, visible_alias = "max-workers")]
    maxforks: Option<String>,

    /// Poll timeout in milliseconds [default: 200]
    #[arg(long)]
    timeout: Option<String>,

    /// Seconds between stats lines [default: 60]
    #[arg(long = "stats-interval")]
    stats_interval: Option<String>,

    /// debug, info or warn
    #[arg(long, default_value = "info")]
    loglevel: String,

    /// Detach from the terminal
    #[arg(long)]
    daemon: bool,
}

impl Cli {
    fn options(&self) -> Options {
        Options {
            hosts: self.host.clone(),
            iface: self.iface.clone(),
            port: self.port.clone(),
            logfile: Some(self.logfile.clone()),
            logrotate: self.logrotate.clone(),
            ratelimit: self.ratelimit.clone(),
            window: self.window.clone(),
            maxforks: self.maxforks.clone(),
            timeout: self.timeout.clone(),
            stats_interval: self.stats_interval.clone(),
        }
    }
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let cli = Cli::parse();

    // Must happen before the runtime spawns any threads
    if cli.daemon {
        daemonize()?;
    }

    let level = cli.loglevel.parse::<LogLevel>();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("udplogd={}", level.as_ref().copied().unwrap_or_default()))
        }))
        .init();
    if let Err(e) = &level {
        warn!(value = %cli.loglevel, error = %e, "Invalid log level, using info");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("Failed to start Tokio runtime")?;
    let summary = runtime.block_on(serve(cli.options()))?;

    info!(
        reason = %summary.reason,
        dropped = summary.counters.dropped,
        skipped = summary.counters.skipped,
        total = summary.counters.total,
        "Exiting"
    );
    Ok(())
}

async fn serve(options: Options) -> Result<ShutdownSummary> {
    let settings = options.resolve().wrap_err("Invalid configuration")?;

    info!(
        logfile = %settings.logfile.display(),
        logrotate = ?settings.logrotate,
        ratelimit = settings.server.rate_limit.limit,
        window_secs = settings.server.rate_limit.window.as_secs(),
        max_workers = settings.server.max_workers,
        timeout_ms = settings.server.poll_timeout.as_millis(),
        "Starting UDP log server"
    );

    let handler = LogHandler::new(PacketLog::new(settings.logfile, settings.logrotate));
    let server =
        UdpLogServer::bind(settings.server, handler).wrap_err("Failed to bind UDP sockets")?;
    server
        .shutdown_handle()
        .listen()
        .wrap_err("Failed to install signal handlers")?;

    server.run().await.wrap_err("UDP log server failed")
}

fn daemonize() -> Result<()> {
    // Keeps the working directory so a relative logfile still resolves
    let result = unsafe { libc::daemon(1, 0) };
    if result != 0 {
        return Err(std::io::Error::last_os_error()).wrap_err("Failed to detach from terminal");
    }
    Ok(())
}
