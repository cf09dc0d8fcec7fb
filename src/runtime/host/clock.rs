//! Host time sources behind the `millis` and `delay` imports

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonic millisecond counter and the host's blocking sleep
pub trait Clock: Send {
    /// Milliseconds since the clock started, wrapping at 2^32
    fn ticks_ms(&self) -> u32;

    /// Block for at least `ms` milliseconds as measured by this clock
    fn sleep_ms(&mut self, ms: u32);
}

/// Wall clock backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn ticks_ms(&self) -> u32 {
        // Truncation is the wrap
        self.origin.elapsed().as_millis() as u32
    }

    fn sleep_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

/// Deterministic clock for tests and simulation
///
/// Clones share the same counter, so a test can keep a handle and observe
/// the time the module sees. Sleeping advances the counter instantly.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU32>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at an arbitrary tick, e.g. just below the wrap point
    pub fn starting_at(ms: u32) -> Self {
        ManualClock {
            now: Arc::new(AtomicU32::new(ms)),
        }
    }

    pub fn advance(&self, ms: u32) {
        // fetch_add on AtomicU32 wraps
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn now(&self) -> u32 {
        self.now.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn ticks_ms(&self) -> u32 {
        self.now()
    }

    fn sleep_ms(&mut self, ms: u32) {
        self.advance(ms);
    }
}
