//! Time source used by polling loops.
//!
//! Polling needs two things from time: the current instant (for deadlines) and
//! a way to wait between attempts. Both sit behind [`Clock`] so tests can run
//! timeouts in virtual time.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&mut self, duration: Duration);
}

/// Wall clock backed by `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Virtual clock: `sleep` advances time instantly.
///
/// Clones share the same timeline, so a test can keep a handle and inspect
/// how much time a session spent waiting.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Total virtual time slept so far.
    pub fn elapsed(&self) -> Duration {
        match self.elapsed.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Move time forward without sleeping.
    pub fn advance(&self, duration: Duration) {
        let mut guard = match self.elapsed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard += duration;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&mut self, duration: Duration) {
        self.advance(duration);
    }
}
