//! Scanner module containing the scan engine and its report types

pub mod engine;

use crate::config::ProbeConfig;
use crate::network::{CloseReason, PortRange, ProbeFailure, ProbeOutcome};
use serde::Serialize;
use std::net::IpAddr;
use std::time::Duration;

pub use engine::ScanEngine;

/// Scan `range` on `target` with the TCP connect prober
pub async fn scan(
    target: IpAddr,
    range: PortRange,
    config: ProbeConfig,
) -> crate::Result<ScanReport> {
    ScanEngine::new(config)?.scan(target, range).await
}

/// Receives progress notifications while a scan runs
///
/// Callbacks are invoked from worker tasks, concurrently and in completion
/// order.
pub trait ScanObserver: Send + Sync {
    fn on_scan_start(&self, _target: IpAddr, _range: PortRange) {}

    fn on_outcome(&self, outcome: &ProbeOutcome);
}

/// Per-scan outcome counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Probes that ran to an outcome
    pub probed: usize,
    pub open: usize,
    pub refused: usize,
    pub timed_out: usize,
    pub errors: usize,
}

impl ScanStats {
    pub fn record(&mut self, outcome: &ProbeOutcome) {
        self.probed += 1;
        match outcome {
            ProbeOutcome::Open(_) => self.open += 1,
            ProbeOutcome::Closed(_, CloseReason::Refused) => self.refused += 1,
            ProbeOutcome::Closed(_, CloseReason::TimedOut) => self.timed_out += 1,
            ProbeOutcome::Error(..) => self.errors += 1,
        }
    }

    /// Probes that did not find an open port
    pub fn not_open(&self) -> usize {
        self.refused + self.timed_out + self.errors
    }
}

/// Final result of one completed scan
///
/// Only built once every probe of the range has finished; read-only after.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    target: IpAddr,
    range: PortRange,
    open_ports: Vec<u16>,
    failures: Vec<(u16, ProbeFailure)>,
    duration: Duration,
    stats: ScanStats,
}

impl ScanReport {
    /// Aggregate probe outcomes into a report
    pub fn from_outcomes<I>(target: IpAddr, range: PortRange, outcomes: I, duration: Duration) -> Self
    where
        I: IntoIterator<Item = ProbeOutcome>,
    {
        let mut stats = ScanStats::default();
        let mut open_ports = Vec::new();
        let mut failures = Vec::new();

        for outcome in outcomes {
            stats.record(&outcome);
            match outcome {
                ProbeOutcome::Open(port) => open_ports.push(port),
                ProbeOutcome::Error(port, failure) => failures.push((port, failure)),
                ProbeOutcome::Closed(..) => {}
            }
        }

        open_ports.sort_unstable();
        open_ports.dedup();
        failures.sort_by_key(|(port, _)| *port);

        Self {
            target,
            range,
            open_ports,
            failures,
            duration,
            stats,
        }
    }

    pub fn target(&self) -> IpAddr {
        self.target
    }

    pub fn range(&self) -> PortRange {
        self.range
    }

    /// Open ports, ascending and without duplicates
    pub fn open_ports(&self) -> &[u16] {
        &self.open_ports
    }

    /// Probes that failed for reasons other than refusal or timeout
    pub fn failures(&self) -> &[(u16, ProbeFailure)] {
        &self.failures
    }

    /// Wall-clock time from first dispatch to last completion
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    /// Get scan rate in ports per second
    pub fn scan_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.stats.probed as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }
}
