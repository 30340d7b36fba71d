//! Shared health state for the /health endpoint.
//! The pipeline records cycles, the scheduler records errors and the
//! running flag; the API reads.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

/// Shared health metrics behind atomics.
#[derive(Default)]
pub struct HealthState {
    /// True while the monitor loop task is alive.
    pub scheduler_running: AtomicBool,
    /// Epoch seconds of the last completed cycle (0 = none yet).
    pub last_cycle_at: AtomicI64,
    pub cycles_completed: AtomicU64,
    pub cycle_errors: AtomicU64,
    /// True when the last cycle was built on stale or empty metric data.
    pub last_cycle_degraded: AtomicBool,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_scheduler_running(&self, v: bool) {
        self.scheduler_running.store(v, Ordering::Relaxed);
    }

    pub fn record_cycle(&self, at: i64, degraded: bool) {
        self.last_cycle_at.store(at, Ordering::Relaxed);
        self.last_cycle_degraded.store(degraded, Ordering::Relaxed);
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cycle_error(&self) {
        self.cycle_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn scheduler_running(&self) -> bool {
        self.scheduler_running.load(Ordering::Relaxed)
    }

    pub fn last_cycle_at(&self) -> i64 {
        self.last_cycle_at.load(Ordering::Relaxed)
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::Relaxed)
    }

    pub fn cycle_errors(&self) -> u64 {
        self.cycle_errors.load(Ordering::Relaxed)
    }

    pub fn last_cycle_degraded(&self) -> bool {
        self.last_cycle_degraded.load(Ordering::Relaxed)
    }
}
