//! Client-silence watchdog.
//!
//! Every drained command feeds the watchdog. It is armed only while at least
//! one servo is enabled; expiry re-arms it from the expiry instant, so a
//! silent system fires at most once per timeout.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout: Option<Duration>,
    last_feed: Instant,
    expirations: u64,
}

impl Watchdog {
    /// `None` disables the watchdog.
    pub fn new(timeout: Option<Duration>, now: Instant) -> Self {
        Self {
            timeout,
            last_feed: now,
            expirations: 0,
        }
    }

    #[inline]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[inline]
    pub const fn expirations(&self) -> u64 {
        self.expirations
    }

    #[inline]
    pub fn feed(&mut self, now: Instant) {
        if now > self.last_feed {
            self.last_feed = now;
        }
    }

    /// Returns `true` when the timeout has elapsed while armed.
    pub fn check(&mut self, now: Instant, armed: bool) -> bool {
        let Some(timeout) = self.timeout else {
            return false;
        };
        if !armed || now.saturating_duration_since(self.last_feed) < timeout {
            return false;
        }
        self.expirations += 1;
        self.last_feed = now;
        true
    }

    pub fn silence(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_feed)
    }
}
