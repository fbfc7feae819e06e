use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use std::time::{Duration, Instant};

/// Rate limiting parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Packets admitted per source per window
    pub limit: u32,
    /// Length of one fixed window
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            window: Duration::from_secs(10),
        }
    }
}

/// Outcome of a rate limiter decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The packet fits in the source's current window
    Accepted { count: u32 },
    /// The source already used up its window
    Rejected { count: u32 },
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted { .. })
    }

    /// Packets seen from the source in its current window, this one included
    pub fn count(&self) -> u32 {
        match *self {
            Admission::Accepted { count } | Admission::Rejected { count } => count,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RateRecord {
    count: u32,
    window_start: Instant,
}

/// Per-source fixed-window counter
///
/// Each source gets a counter that starts when its first packet arrives.
/// The counter resets only once *more than* `window` has elapsed since the
/// window started, so a burst straddling a boundary can see up to twice the
/// limit admitted in a short span.
///
/// Records are never evicted. The limiter performs no I/O and no locking;
/// it is meant to be owned by a single reactor task.
///
/// # Examples
///
/// ```
/// use udplogd::security::{RateLimitConfig, RateLimiter};
/// use std::net::IpAddr;
/// use std::time::{Duration, Instant};
///
/// let mut limiter = RateLimiter::new(RateLimitConfig {
///     limit: 2,
///     window: Duration::from_secs(10),
/// });
/// let source: IpAddr = "10.0.0.1".parse().unwrap();
/// let now = Instant::now();
///
/// assert!(limiter.admit(source, now).is_accepted());
/// assert!(limiter.admit(source, now).is_accepted());
/// assert!(!limiter.admit(source, now).is_accepted());
/// ```
#[derive(Debug)]
pub struct RateLimiter<K = IpAddr> {
    config: RateLimitConfig,
    records: HashMap<K, RateRecord>,
}

impl<K: Hash + Eq> RateLimiter<K> {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            records: HashMap::new(),
        }
    }

    /// Records one packet from `source` at `now` and decides whether it is admitted
    pub fn admit(&mut self, source: K, now: Instant) -> Admission {
        let window = self.config.window;
        let record = self.records.entry(source).or_insert(RateRecord {
            count: 0,
            window_start: now,
        });

        if record.count == 0 || now.saturating_duration_since(record.window_start) > window {
            record.count = 1;
            record.window_start = now;
        } else {
            record.count = record.count.saturating_add(1);
        }

        if record.count <= self.config.limit {
            Admission::Accepted {
                count: record.count,
            }
        } else {
            Admission::Rejected {
                count: record.count,
            }
        }
    }

    /// Number of sources that have ever been seen
    pub fn tracked_sources(&self) -> usize {
        self.records.len()
    }

    /// Current window count for `source`, if it has been seen
    pub fn count(&self, source: &K) -> Option<u32> {
        self.records.get(source).map(|record| record.count)
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            limit,
            window: Duration::from_secs(window_secs),
        })
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_burst_within_window_is_capped() {
        let mut limiter = limiter(3, 10);
        let start = Instant::now();
        let source = ip("10.0.0.1");

        let decisions: Vec<bool> = (0..5)
            .map(|i| {
                limiter
                    .admit(source, start + Duration::from_millis(i * 200))
                    .is_accepted()
            })
            .collect();

        assert_eq!(decisions, vec![true, true, true, false, false]);
        assert_eq!(limiter.count(&source), Some(5));
    }

    #[test]
    fn test_counter_resets_after_window() {
        let mut limiter = limiter(10, 10);
        let start = Instant::now();
        let source = ip("10.0.0.1");

        assert!(limiter.admit(source, start).is_accepted());
        let later = limiter.admit(source, start + Duration::from_secs(11));

        assert_eq!(later, Admission::Accepted { count: 1 });
        assert_eq!(limiter.count(&source), Some(1));
    }

    #[test]
    fn test_exact_window_boundary_does_not_reset() {
        let mut limiter = limiter(1, 10);
        let start = Instant::now();
        let source = ip("10.0.0.1");

        assert!(limiter.admit(source, start).is_accepted());
        let at_boundary = limiter.admit(source, start + Duration::from_secs(10));
        assert_eq!(at_boundary, Admission::Rejected { count: 2 });

        let past_boundary =
            limiter.admit(source, start + Duration::from_secs(10) + Duration::from_millis(1));
        assert_eq!(past_boundary, Admission::Accepted { count: 1 });
    }

    #[test]
    fn test_rejected_source_recovers_after_window() {
        let mut limiter = limiter(2, 10);
        let start = Instant::now();
        let source = ip("10.0.0.1");

        for _ in 0..4 {
            limiter.admit(source, start);
        }
        assert!(!limiter.admit(source, start + Duration::from_secs(5)).is_accepted());
        assert!(limiter.admit(source, start + Duration::from_secs(11)).is_accepted());
    }

    #[test]
    fn test_sources_are_independent() {
        let mut limiter = limiter(1, 10);
        let now = Instant::now();

        assert!(limiter.admit(ip("10.0.0.1"), now).is_accepted());
        assert!(!limiter.admit(ip("10.0.0.1"), now).is_accepted());
        assert!(limiter.admit(ip("10.0.0.2"), now).is_accepted());
        assert!(limiter.admit(ip("::1"), now).is_accepted());
        assert_eq!(limiter.tracked_sources(), 3);
    }

    #[test]
    fn test_double_burst_across_boundary() {
        let mut limiter = limiter(3, 10);
        let start = Instant::now();
        let source = ip("10.0.0.1");

        assert!(limiter.admit(source, start).is_accepted());
        let late = start + Duration::from_millis(9_950);
        let early = start + Duration::from_millis(10_050);

        let before = (0..2)
            .filter(|_| limiter.admit(source, late).is_accepted())
            .count();
        let after = (0..3)
            .filter(|_| limiter.admit(source, early).is_accepted())
            .count();

        // Five packets admitted within 100ms against a limit of three
        assert_eq!(before + after, 5);
    }
}
