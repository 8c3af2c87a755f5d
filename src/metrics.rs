use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Booking lifecycle counters for monitoring
#[derive(Clone)]
pub struct Metrics {
    pub holds_created: Arc<AtomicU64>,
    pub payments_confirmed: Arc<AtomicU64>,
    pub payments_failed: Arc<AtomicU64>,
    pub holds_cancelled: Arc<AtomicU64>,
    pub holds_expired: Arc<AtomicU64>,
    pub sweeps_run: Arc<AtomicU64>,
    pub sweep_errors: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            holds_created: Arc::new(AtomicU64::new(0)),
            payments_confirmed: Arc::new(AtomicU64::new(0)),
            payments_failed: Arc::new(AtomicU64::new(0)),
            holds_cancelled: Arc::new(AtomicU64::new(0)),
            holds_expired: Arc::new(AtomicU64::new(0)),
            sweeps_run: Arc::new(AtomicU64::new(0)),
            sweep_errors: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_holds_created(&self) {
        self.holds_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_payments_confirmed(&self) {
        self.payments_confirmed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_payments_failed(&self) {
        self.payments_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_holds_cancelled(&self) {
        self.holds_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one sweep tick and how many holds it expired.
    pub fn record_sweep(&self, expired: u64) {
        self.sweeps_run.fetch_add(1, Ordering::Relaxed);
        self.holds_expired.fetch_add(expired, Ordering::Relaxed);
    }

    pub fn inc_sweep_errors(&self) {
        self.sweeps_run.fetch_add(1, Ordering::Relaxed);
        self.sweep_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            holds_created: self.holds_created.load(Ordering::Relaxed),
            payments_confirmed: self.payments_confirmed.load(Ordering::Relaxed),
            payments_failed: self.payments_failed.load(Ordering::Relaxed),
            holds_cancelled: self.holds_cancelled.load(Ordering::Relaxed),
            holds_expired: self.holds_expired.load(Ordering::Relaxed),
            sweeps_run: self.sweeps_run.load(Ordering::Relaxed),
            sweep_errors: self.sweep_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub holds_created: u64,
    pub payments_confirmed: u64,
    pub payments_failed: u64,
    pub holds_cancelled: u64,
    pub holds_expired: u64,
    pub sweeps_run: u64,
    pub sweep_errors: u64,
    pub uptime_seconds: u64,
}
