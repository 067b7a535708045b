//! Concurrent subnet sweeper.
//!
//! One sweep probes every host address of a /24, batch by batch, and
//! refreshes the device registry with the reachable ones. Batches run
//! their probes concurrently but complete before the next batch starts,
//! so peak socket/process usage is capped at the batch size regardless of
//! subnet size. The periodic timer and the on-demand trigger share one
//! overlap guard: a trigger while a sweep is active is rejected
//! immediately, never queued.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};
use crate::net::{local_cidr, subnet_hosts};
use crate::probe::{Probe, ProbeReport};
use crate::registry::DeviceRegistry;
use crate::relay::{Event, Relay};
use crate::types::ScanStatus;

/// Default number of concurrently in-flight probes
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Default per-probe timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Tunables for one sweeper.
#[derive(Debug, Clone)]
pub struct SweepOptions {
    /// Explicit /24 CIDR; auto-derived from the primary local IPv4 when absent
    pub cidr: Option<String>,
    pub batch_size: usize,
    pub probe_timeout: Duration,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            cidr: None,
            batch_size: DEFAULT_BATCH_SIZE,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Result of asking for a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed,
    /// A sweep was already active; nothing was started
    AlreadyRunning,
}

/// Process-wide scan state: at most one sweep active at a time, plus the
/// time of the last completed sweep.
struct ScanState {
    scanning: AtomicBool,
    last_scan: Mutex<Option<DateTime<Utc>>>,
}

impl ScanState {
    fn new() -> Self {
        Self {
            scanning: AtomicBool::new(false),
            last_scan: Mutex::new(None),
        }
    }

    /// Atomically check-and-set the busy flag. The returned guard clears
    /// it on drop, covering every exit path.
    fn try_begin(self: &Arc<Self>) -> Option<ScanGuard> {
        if self
            .scanning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(ScanGuard {
                state: self.clone(),
            })
        } else {
            None
        }
    }

    fn record_completed(&self) {
        if let Ok(mut last) = self.last_scan.lock() {
            *last = Some(Utc::now());
        }
    }

    fn status(&self) -> ScanStatus {
        ScanStatus {
            is_scanning: self.scanning.load(Ordering::Acquire),
            last_scan: self.last_scan.lock().map(|g| *g).unwrap_or(None),
        }
    }
}

struct ScanGuard {
    state: Arc<ScanState>,
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.state.scanning.store(false, Ordering::Release);
    }
}

/// Admission token for one sweep. Holding it owns the process-wide scan
/// slot; dropping it without running releases the slot.
pub struct AdmittedSweep {
    sweeper: Arc<Sweeper>,
    _guard: ScanGuard,
}

impl AdmittedSweep {
    /// Run the admitted sweep to completion, then record the finish time.
    pub async fn run(self) -> Result<()> {
        self.sweeper.run_sweep().await?;
        self.sweeper.state.record_completed();
        Ok(())
    }
}

/// Sweeps a /24 and keeps the device registry fresh.
pub struct Sweeper {
    probe: Arc<dyn Probe>,
    registry: Arc<dyn DeviceRegistry>,
    relay: Arc<Relay>,
    options: SweepOptions,
    state: Arc<ScanState>,
}

impl Sweeper {
    pub fn new(
        probe: Arc<dyn Probe>,
        registry: Arc<dyn DeviceRegistry>,
        relay: Arc<Relay>,
        options: SweepOptions,
    ) -> Self {
        Self {
            probe,
            registry,
            relay,
            options,
            state: Arc::new(ScanState::new()),
        }
    }

    /// Current scan-state flag and last completed sweep time.
    pub fn status(&self) -> ScanStatus {
        self.state.status()
    }

    /// Claim the sweep slot without starting work.
    ///
    /// Admission is atomic with the busy check, so a caller can report
    /// "already running" and start the admitted sweep later (e.g. in a
    /// spawned task) without the answer going stale in between.
    pub fn try_begin(self: &Arc<Self>) -> Option<AdmittedSweep> {
        let guard = self.state.try_begin()?;
        Some(AdmittedSweep {
            sweeper: self.clone(),
            _guard: guard,
        })
    }

    /// Start one sweep unless one is already active.
    ///
    /// Both the interval timer and on-demand requests come through here,
    /// so the overlap guard covers every pacing mechanism.
    pub async fn trigger(self: &Arc<Self>) -> Result<SweepOutcome> {
        match self.try_begin() {
            Some(admitted) => {
                admitted.run().await?;
                Ok(SweepOutcome::Completed)
            }
            None => {
                debug!("sweep already running, trigger rejected");
                Ok(SweepOutcome::AlreadyRunning)
            }
        }
    }

    async fn run_sweep(&self) -> Result<()> {
        let cidr = match &self.options.cidr {
            Some(cidr) => cidr.clone(),
            None => local_cidr().map_err(CoreError::Sweep)?,
        };
        let hosts = subnet_hosts(&cidr).map_err(CoreError::Sweep)?;

        info!(%cidr, hosts = hosts.len(), batch_size = self.options.batch_size, "sweep started");
        let mut reachable = 0usize;

        for batch in hosts.chunks(self.options.batch_size.max(1)) {
            let probes = batch
                .iter()
                .map(|&ip| self.probe_host(ip))
                .collect::<Vec<_>>();

            for (ip, outcome) in batch.iter().zip(join_all(probes).await) {
                match outcome {
                    Ok(Some(_)) => reachable += 1,
                    Ok(None) => {}
                    Err(e) => {
                        // Batch-level failures skip the rest of this batch's
                        // bookkeeping but never abort the sweep.
                        warn!(%ip, error = %e, "probe batch entry failed");
                    }
                }
            }
        }

        let devices = self.registry.list().await.map_err(CoreError::Registry)?;
        info!(reachable, known = devices.len(), "sweep finished");
        self.relay.publish(Event::DevicesUpdated { devices });
        Ok(())
    }

    /// Probe one host and upsert it when it answers. Unreachable hosts are
    /// skipped silently: no record, no negative cache.
    async fn probe_host(&self, ip: Ipv4Addr) -> Result<Option<ProbeReport>> {
        let report = match self.probe.probe(ip, self.options.probe_timeout).await {
            Ok(report) => report,
            Err(e) => {
                // A single failed probe is not an error for the sweep.
                debug!(%ip, error = %e, "probe failed");
                return Ok(None);
            }
        };

        if !report.alive {
            return Ok(None);
        }

        self.registry
            .upsert(&ip.to_string(), report.rtt_ms)
            .await
            .map_err(CoreError::Registry)?;
        Ok(Some(report))
    }

    /// On-demand probe of a single address: upsert on success and publish
    /// a ping-result event regardless of outcome.
    pub async fn ping_once(&self, ip: Ipv4Addr) -> Result<ProbeReport> {
        let report = self
            .probe
            .probe(ip, self.options.probe_timeout)
            .await
            .unwrap_or(ProbeReport::unreachable());

        if report.alive {
            self.registry
                .upsert(&ip.to_string(), report.rtt_ms)
                .await
                .map_err(CoreError::Registry)?;
        }

        self.relay.publish(Event::PingResult {
            ip: ip.to_string(),
            alive: report.alive,
            rtt: report.rtt_ms,
        });
        Ok(report)
    }

    /// Fixed-interval pacing loop. Sweep failures are logged; the next
    /// scheduled sweep proceeds unaffected.
    pub async fn run_interval(self: Arc<Self>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; that gives viewers an initial
        // device list right after startup.
        loop {
            ticker.tick().await;
            match self.trigger().await {
                Ok(SweepOutcome::Completed) => {}
                Ok(SweepOutcome::AlreadyRunning) => {
                    debug!("interval tick skipped, sweep still active");
                }
                Err(e) => warn!(error = %e, "sweep failed"),
            }
        }
    }
}
