use shared::TtlMs;
use std::sync::atomic::{AtomicU64, Ordering};

/// Decides when a lazy sweep is due.
///
/// Sweeps are triggered by table access, but at most once per `interval` so
/// a large table is not scanned on every request. A zero interval sweeps on
/// every access.
#[derive(Debug)]
pub struct SweepSchedule {
    interval: TtlMs,
    last_sweep_ms: AtomicU64,
}

impl SweepSchedule {
    pub fn new(interval: TtlMs) -> Self {
        Self {
            interval,
            last_sweep_ms: AtomicU64::new(0),
        }
    }

    /// Returns true for exactly one caller once the interval has elapsed
    pub fn claim(&self, now_ms: u64) -> bool {
        let last = self.last_sweep_ms.load(Ordering::Acquire);
        if self.interval.0 > 0 && now_ms.saturating_sub(last) < self.interval.0 {
            return false;
        }
        self.last_sweep_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Record a sweep that ran outside the schedule
    pub fn mark(&self, now_ms: u64) {
        self.last_sweep_ms.store(now_ms, Ordering::Release);
    }

    pub fn interval(&self) -> TtlMs {
        self.interval
    }
}
