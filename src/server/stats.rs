use crate::logging::stats_line;
use std::time::{Duration, Instant};
use tracing::info;

/// Cumulative traffic counters, written only by the reactor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// Datagrams rejected by the rate limiter
    pub dropped: u64,
    /// Datagrams rejected because the worker pool was full
    pub skipped: u64,
    /// Non-empty datagrams received
    pub total: u64,
}

/// Emits the stats line at most once per interval
#[derive(Debug)]
pub struct StatsReporter {
    interval: Duration,
    last_emit: Instant,
}

impl StatsReporter {
    /// The first line is due one full `interval` after `now`
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last_emit: now,
        }
    }

    /// Logs and returns the stats line if `interval` has elapsed since the last one
    pub fn tick(&mut self, now: Instant, counters: &Counters) -> Option<String> {
        if now.saturating_duration_since(self.last_emit) < self.interval {
            return None;
        }
        self.last_emit = now;

        let line = stats_line(counters.dropped, counters.skipped);
        info!(
            dropped = counters.dropped,
            skipped = counters.skipped,
            total = counters.total,
            "{line}"
        );
        Some(line)
    }
}
