//! Statistics tracking for censorship checks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Atomic counters shared by every worker of a checker.
#[derive(Debug)]
pub struct Stats {
    checks: AtomicU64,
    cached: AtomicU64,
    blocked: AtomicU64,
    failed: AtomicU64,
    probes: AtomicU64,
    in_flight: AtomicU64,
    peak_in_flight: AtomicU64,
    /// Cumulative probe time in microseconds for averaging.
    total_probe_time_us: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            checks: AtomicU64::new(0),
            cached: AtomicU64::new(0),
            blocked: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            probes: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
            peak_in_flight: AtomicU64::new(0),
            total_probe_time_us: AtomicU64::new(0),
        }
    }

    pub fn record_check(&self, blocked: bool, failed: bool) {
        self.checks.fetch_add(1, Ordering::Relaxed);
        if blocked {
            self.blocked.fetch_add(1, Ordering::Relaxed);
        }
        if failed {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_cached(&self) {
        self.cached.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark a probe as started; the returned guard marks it finished on drop.
    pub fn probe_started(&self) -> ProbeGuard<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        ProbeGuard { stats: self }
    }

    fn record_probe(&self, elapsed: Duration) {
        self.probes.fetch_add(1, Ordering::Relaxed);
        self.total_probe_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Probes currently waiting on the network.
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous probes since the last reset.
    pub fn peak_in_flight(&self) -> u64 {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn snapshot_and_reset(&self) -> StatsSnapshot {
        let checks = self.checks.swap(0, Ordering::Relaxed);
        let cached = self.cached.swap(0, Ordering::Relaxed);
        let blocked = self.blocked.swap(0, Ordering::Relaxed);
        let failed = self.failed.swap(0, Ordering::Relaxed);
        let probes = self.probes.swap(0, Ordering::Relaxed);
        let total_us = self.total_probe_time_us.swap(0, Ordering::Relaxed);
        let peak_in_flight = self
            .peak_in_flight
            .swap(self.in_flight.load(Ordering::SeqCst), Ordering::SeqCst);

        let avg_probe_ms = if probes > 0 {
            (total_us as f64 / probes as f64) / 1000.0
        } else {
            0.0
        };

        StatsSnapshot {
            checks,
            cached,
            blocked,
            failed,
            probes,
            peak_in_flight,
            avg_probe_ms,
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

/// Ends a probe's in-flight window, even when the probe future is dropped.
pub struct ProbeGuard<'a> {
    stats: &'a Stats,
}

impl ProbeGuard<'_> {
    pub fn finish(self, elapsed: Duration) {
        self.stats.record_probe(elapsed);
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    pub checks: u64,
    pub cached: u64,
    pub blocked: u64,
    pub failed: u64,
    pub probes: u64,
    pub peak_in_flight: u64,
    pub avg_probe_ms: f64,
}
