use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Timer for measuring operation latency.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Stop the timer and return the elapsed duration.
    pub fn stop(self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed time without consuming the timer.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Wall-clock helpers.
pub struct Clock;

impl Clock {
    /// Nanoseconds since the Unix epoch.
    pub fn nanos() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64
    }

    /// Milliseconds since the Unix epoch.
    pub fn millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}
