//! Sources of the current time, read by clock gates
//!
//! Evaluation reads the time once per pass, so that every clock in a pass sees the same instant.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies the current time in milliseconds
pub trait TimeProvider: Send + Sync {
    /// Current time, in milliseconds
    fn current_time(&self) -> u64;
}

/// Wall-clock time since the Unix epoch
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTime;

impl TimeProvider for RealTime {
    fn current_time(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Time that advances by a fixed step on every read, for reproducible runs
#[derive(Debug)]
pub struct SteppedTime {
    next: AtomicU64,
    step: u64,
}

impl SteppedTime {
    /// Start at `start`, advancing by `step` after each read
    pub fn new(start: u64, step: u64) -> Self {
        SteppedTime {
            next: AtomicU64::new(start),
            step,
        }
    }
}

impl TimeProvider for SteppedTime {
    fn current_time(&self) -> u64 {
        self.next.fetch_add(self.step, Ordering::Relaxed)
    }
}

/// Time frozen at a given instant
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedTime(pub u64);

impl TimeProvider for FixedTime {
    fn current_time(&self) -> u64 {
        self.0
    }
}
