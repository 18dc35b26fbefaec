//! Main scanning engine implementation
//!
//! One scan is a single-shot pipeline: validate, dispatch one probe per port
//! through a semaphore-bounded worker pool, wait for every probe, aggregate.

use crate::config::ProbeConfig;
use crate::network::{PortProber, PortRange, ProbeFailure, ProbeOutcome, TcpConnectProber};
use crate::scanner::{ScanObserver, ScanReport};
use crate::ScanError;
use futures::FutureExt;
use std::io;
use std::net::IpAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Main scanning engine
pub struct ScanEngine {
    config: ProbeConfig,
    prober: Arc<dyn PortProber>,
    observer: Option<Arc<dyn ScanObserver>>,
}

impl ScanEngine {
    /// Create a scan engine probing with real TCP connects
    pub fn new(config: ProbeConfig) -> crate::Result<Self> {
        let prober = TcpConnectProber::new(config.timeout_duration());
        Self::with_prober(config, Arc::new(prober))
    }

    /// Create a scan engine driven by a custom prober
    pub fn with_prober(config: ProbeConfig, prober: Arc<dyn PortProber>) -> crate::Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            prober,
            observer: None,
        })
    }

    /// Attach a progress observer
    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Probe every port of `range` and wait for all of them
    pub async fn scan(&self, target: IpAddr, range: PortRange) -> crate::Result<ScanReport> {
        self.scan_until_cancelled(target, range, CancellationToken::new())
            .await
    }

    /// Like [`ScanEngine::scan`], but stops early when `cancel` fires
    ///
    /// On cancellation no further probes are dispatched, every in-flight probe
    /// task is aborted and reaped, and [`ScanError::Cancelled`] is returned.
    /// Aborting a probe drops its connect future, which closes its socket.
    ///
    /// When panics unwind, a panicking prober or observer costs only its own
    /// port, which is reported as an error outcome. Under `panic = "abort"`
    /// (the release profile) the process terminates instead.
    pub async fn scan_until_cancelled(
        &self,
        target: IpAddr,
        range: PortRange,
        cancel: CancellationToken,
    ) -> crate::Result<ScanReport> {
        self.config.validate()?;
        range.validate()?;

        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        log::info!(
            "Starting scan of {} ports {} ({} ports, concurrency {}, timeout {}ms)",
            target,
            range,
            range.len(),
            self.config.concurrency,
            self.config.timeout
        );

        if let Some(observer) = &self.observer {
            observer.on_scan_start(target, range);
        }

        // Permits beyond the number of ports would never be used.
        let permits = self.config.concurrency.min(range.len());
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut probes: JoinSet<ProbeOutcome> = JoinSet::new();
        let start_time = Instant::now();

        for port in range.ports() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                return Err(Self::abort_in_flight(probes).await);
            };

            let prober = Arc::clone(&self.prober);
            let observer = self.observer.clone();

            probes.spawn(async move {
                let outcome = AssertUnwindSafe(prober.probe(target, port))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        ProbeOutcome::Error(
                            port,
                            ProbeFailure::new(io::ErrorKind::Other, "probe task panicked"),
                        )
                    });
                drop(permit);

                match &outcome {
                    ProbeOutcome::Open(port) => log::info!("Port {} is OPEN on {}", port, target),
                    ProbeOutcome::Error(port, failure) => {
                        log::debug!("Probe of {}:{} failed: {}", target, port, failure)
                    }
                    ProbeOutcome::Closed(..) => {}
                }

                if let Some(observer) = observer {
                    let notified = std::panic::catch_unwind(AssertUnwindSafe(|| {
                        observer.on_outcome(&outcome)
                    }));
                    if notified.is_err() {
                        log::error!("Scan observer panicked on port {}", port);
                    }
                }

                outcome
            });
        }

        let mut outcomes = Vec::with_capacity(range.len());
        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                joined = probes.join_next() => Some(joined),
            };
            let Some(joined) = joined else {
                return Err(Self::abort_in_flight(probes).await);
            };

            match joined {
                Some(Ok(outcome)) => outcomes.push(outcome),
                Some(Err(e)) => log::error!("Probe task failed: {}", e),
                None => break,
            }
        }

        let report = ScanReport::from_outcomes(target, range, outcomes, start_time.elapsed());

        log::info!(
            "Scan completed in {:.2}s - {}/{} ports open",
            report.duration().as_secs_f64(),
            report.open_ports().len(),
            range.len()
        );

        Ok(report)
    }

    /// Abort and reap every probe task still owned by the pool
    async fn abort_in_flight(mut probes: JoinSet<ProbeOutcome>) -> ScanError {
        let unfinished = probes.len();
        probes.shutdown().await;
        log::warn!("Scan cancelled, discarded {} unfinished probes", unfinished);
        ScanError::Cancelled
    }
}
