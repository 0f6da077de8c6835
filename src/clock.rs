// DriveMonitor - Time Source
//
// Alerts and batches are stamped in milliseconds since boot. The value wraps
// after ~49 days, which is fine for relative timestamps.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u32;
}

/// Monotonic clock counting from its own construction (boot).
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    boot: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { boot: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u32 {
        self.boot.elapsed().as_millis() as u32
    }
}

/// Hand-driven clock for deterministic timestamps.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU32,
}

impl ManualClock {
    pub fn new(start_ms: u32) -> Self {
        Self { now: AtomicU32::new(start_ms) }
    }

    pub fn set(&self, ms: u32) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u32) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.now.load(Ordering::SeqCst)
    }
}
