//! Connectivity Supervisor - periodic device probe with automatic recovery
//!
//! Each cycle probes the console device once. If it is not connected the
//! recovery procedure is triggered once; nothing is retried within a cycle.
//! A cycle that cannot run the probe tool treats the device as disconnected
//! and recovers anyway.
//!
//! Cycle shape: `IDLE -> PROBING -> RECOVERING -> IDLE` or
//! `IDLE -> PROBING -> IDLE`. Nothing carries over between cycles except the
//! counters in [`SupervisorSnapshot`], which only the loop writes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::device::{listing_state, ConnectivityProbe, DeviceConnectivityState, RecoveryTrigger};
use crate::exec::Delivery;

/// Message returned by every forced reconnect.
pub const RECONNECT_ACK_MESSAGE: &str = "Reconnected";

/// Acknowledgment of a forced reconnect.
///
/// Returned whatever the recovery procedure did. It does not mean the device
/// is connected again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconnectAck {
    pub message: String,
}

impl Default for ReconnectAck {
    fn default() -> Self {
        Self {
            message: RECONNECT_ACK_MESSAGE.to_string(),
        }
    }
}

/// What one cycle saw and did.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub state: DeviceConnectivityState,
    /// `None` when the device was connected and recovery was not needed
    pub recovery: Option<Result<Delivery, String>>,
}

/// Counters maintained by the background loop.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SupervisorSnapshot {
    /// Completed cycles
    pub cycles: u64,
    /// Cycles that triggered recovery
    pub recoveries_triggered: u64,
    /// Verdict of the most recent cycle
    pub last_state: Option<DeviceConnectivityState>,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

/// Keeps the console device connected.
///
/// Cheap to clone; clones share the probe, the recovery trigger and the
/// snapshot. Handlers call [`query_status`](Self::query_status) and
/// [`force_reconnect`](Self::force_reconnect) directly and never wait on the
/// background loop.
#[derive(Clone)]
pub struct ConnectivitySupervisor {
    probe: Arc<dyn ConnectivityProbe>,
    recovery: Arc<dyn RecoveryTrigger>,
    interval: Duration,
    snapshot: Arc<RwLock<SupervisorSnapshot>>,
}

impl ConnectivitySupervisor {
    pub fn new(
        probe: Arc<dyn ConnectivityProbe>,
        recovery: Arc<dyn RecoveryTrigger>,
        interval: Duration,
    ) -> Self {
        Self {
            probe,
            recovery,
            interval,
            snapshot: Arc::new(RwLock::new(SupervisorSnapshot::default())),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Shared read handle on the loop's counters (for the health endpoint).
    pub fn snapshot_handle(&self) -> Arc<RwLock<SupervisorSnapshot>> {
        Arc::clone(&self.snapshot)
    }

    /// Probe once. A probe tool that cannot be run counts as disconnected.
    pub async fn probe(&self) -> DeviceConnectivityState {
        match self.probe.fetch_listing().await {
            Ok(listing) => listing_state(&listing),
            Err(e) => {
                error!(error = %e, "Device probe tool failed, treating device as disconnected");
                DeviceConnectivityState::Disconnected
            }
        }
    }

    /// Fresh verdict for a caller. Does not look at the background loop.
    pub async fn query_status(&self) -> DeviceConnectivityState {
        self.probe().await
    }

    /// Run the recovery procedure now and acknowledge.
    pub async fn force_reconnect(&self) -> ReconnectAck {
        info!("Forced reconnect requested");
        let outcome = self.trigger_recovery().await;
        debug!(outcome = ?outcome, "Forced reconnect finished");
        ReconnectAck::default()
    }

    async fn trigger_recovery(&self) -> Result<Delivery, String> {
        match self.recovery.recover().await {
            Ok(delivery) => {
                if delivery.is_confirmed() {
                    info!(outcome = %delivery, "Recovery procedure finished");
                } else {
                    warn!(outcome = %delivery, "Recovery procedure exited abnormally");
                }
                Ok(delivery)
            }
            Err(e) => {
                error!(error = %e, "Recovery procedure could not be run");
                Err(e.to_string())
            }
        }
    }

    /// Run one probe, plus one recovery if the device is not connected.
    pub async fn run_cycle(&self) -> CycleReport {
        debug!("Running connectivity check");

        let state = self.probe().await;
        let recovery = match state {
            DeviceConnectivityState::Connected => {
                info!("Device connected, no action needed");
                None
            }
            DeviceConnectivityState::Disconnected => {
                warn!("Device disconnected, attempting to reconnect");
                Some(self.trigger_recovery().await)
            }
        };

        let mut snapshot = self.snapshot.write().await;
        snapshot.cycles += 1;
        if recovery.is_some() {
            snapshot.recoveries_triggered += 1;
        }
        snapshot.last_state = Some(state);
        snapshot.last_cycle_at = Some(Utc::now());

        CycleReport { state, recovery }
    }

    /// Run cycles until `cancel` fires (call from `tokio::spawn`).
    ///
    /// The first cycle runs immediately. Cycles are awaited one after the
    /// other, so they never overlap; a cycle that overruns the interval
    /// pushes the next tick back rather than bunching ticks up.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Connectivity supervisor started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Connectivity supervisor stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let report = tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("Connectivity supervisor stopping mid-cycle");
                            break;
                        }
                        report = self.run_cycle() => report,
                    };
                    debug!(state = %report.state, recovered = report.recovery.is_some(), "Cycle complete");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ExecError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FixedProbe {
        listing: Mutex<Option<String>>,
        calls: AtomicUsize,
    }

    impl FixedProbe {
        fn new(listing: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                listing: Mutex::new(listing.map(str::to_string)),
                calls: AtomicUsize::new(0),
            })
        }

        fn set(&self, listing: Option<&str>) {
            *self.listing.lock().unwrap() = listing.map(str::to_string);
        }
    }

    #[async_trait]
    impl ConnectivityProbe for FixedProbe {
        async fn fetch_listing(&self) -> Result<String, ExecError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.listing
                .lock()
                .unwrap()
                .clone()
                .ok_or(ExecError::EmptyCommand)
        }
    }

    struct CountingRecovery {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingRecovery {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RecoveryTrigger for CountingRecovery {
        async fn recover(&self) -> Result<Delivery, ExecError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ExecError::Timeout {
                    program: "./reconnect.sh".to_string(),
                    secs: 30,
                })
            } else {
                Ok(Delivery::Confirmed)
            }
        }
    }

    const CONNECTED: &str = "List of devices attached\nABC123\tdevice\n";
    const DISCONNECTED: &str = "List of devices attached\n";

    fn supervisor(
        probe: Arc<FixedProbe>,
        recovery: Arc<CountingRecovery>,
    ) -> ConnectivitySupervisor {
        ConnectivitySupervisor::new(probe, recovery, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_connected_cycle_does_not_recover() {
        let recovery = CountingRecovery::new(false);
        let sup = supervisor(FixedProbe::new(Some(CONNECTED)), recovery.clone());

        let report = sup.run_cycle().await;

        assert_eq!(report.state, DeviceConnectivityState::Connected);
        assert!(report.recovery.is_none());
        assert_eq!(recovery.calls(), 0);
    }

    #[tokio::test]
    async fn test_disconnected_cycle_recovers_exactly_once() {
        let recovery = CountingRecovery::new(false);
        let sup = supervisor(FixedProbe::new(Some(DISCONNECTED)), recovery.clone());

        let report = sup.run_cycle().await;

        assert_eq!(report.state, DeviceConnectivityState::Disconnected);
        assert_eq!(report.recovery, Some(Ok(Delivery::Confirmed)));
        assert_eq!(recovery.calls(), 1);
    }

    #[tokio::test]
    async fn test_probe_tool_failure_counts_as_disconnected() {
        let recovery = CountingRecovery::new(false);
        let sup = supervisor(FixedProbe::new(None), recovery.clone());

        let report = sup.run_cycle().await;

        assert_eq!(report.state, DeviceConnectivityState::Disconnected);
        assert_eq!(recovery.calls(), 1);
    }

    #[tokio::test]
    async fn test_failing_recovery_does_not_stop_cycles() {
        let recovery = CountingRecovery::new(true);
        let sup = supervisor(FixedProbe::new(Some(DISCONNECTED)), recovery.clone());

        let first = sup.run_cycle().await;
        let second = sup.run_cycle().await;

        assert!(matches!(first.recovery, Some(Err(_))));
        assert!(matches!(second.recovery, Some(Err(_))));
        assert_eq!(recovery.calls(), 2);

        let snapshot = sup.snapshot_handle().read().await.clone();
        assert_eq!(snapshot.cycles, 2);
        assert_eq!(snapshot.recoveries_triggered, 2);
    }

    #[tokio::test]
    async fn test_force_reconnect_acknowledges_failed_recovery() {
        let recovery = CountingRecovery::new(true);
        let sup = supervisor(FixedProbe::new(Some(CONNECTED)), recovery.clone());

        let ack = sup.force_reconnect().await;

        assert_eq!(ack.message, "Reconnected");
        assert_eq!(recovery.calls(), 1);
    }

    #[tokio::test]
    async fn test_query_status_is_fresh_and_idempotent() {
        let probe = FixedProbe::new(Some(CONNECTED));
        let sup = supervisor(probe.clone(), CountingRecovery::new(false));

        assert_eq!(sup.query_status().await, DeviceConnectivityState::Connected);
        assert_eq!(sup.query_status().await, DeviceConnectivityState::Connected);

        probe.set(Some(DISCONNECTED));
        assert_eq!(sup.query_status().await, DeviceConnectivityState::Disconnected);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);

        // Status queries are not cycles
        assert_eq!(sup.snapshot_handle().read().await.cycles, 0);
    }

    /// First call hangs for 5s, later calls answer at once.
    struct SlowFirstProbe {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ConnectivityProbe for SlowFirstProbe {
        async fn fetch_listing(&self) -> Result<String, ExecError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok(CONNECTED.to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cycle_does_not_stall_status_query() {
        let probe = Arc::new(SlowFirstProbe {
            calls: AtomicUsize::new(0),
        });
        let sup = ConnectivitySupervisor::new(
            probe.clone(),
            CountingRecovery::new(false),
            Duration::from_secs(60),
        );

        let cycle = tokio::spawn({
            let sup = sup.clone();
            async move { sup.run_cycle().await }
        });
        while probe.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let state = tokio::time::timeout(Duration::from_millis(100), sup.query_status())
            .await
            .expect("status query should not wait for the running cycle");
        assert_eq!(state, DeviceConnectivityState::Connected);
        assert!(!cycle.is_finished());

        let report = cycle.await.unwrap();
        assert_eq!(report.state, DeviceConnectivityState::Connected);
        assert_eq!(sup.snapshot_handle().read().await.cycles, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_runs_one_cycle_per_interval() {
        let probe = FixedProbe::new(Some(DISCONNECTED));
        let recovery = CountingRecovery::new(false);
        let sup = supervisor(probe.clone(), recovery.clone());
        let snapshot = sup.snapshot_handle();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(sup.run(cancel.clone()));

        // First cycle runs immediately, then one per 60s
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(recovery.calls(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(recovery.calls(), 2);

        probe.set(Some(CONNECTED));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(recovery.calls(), 2);
        assert_eq!(snapshot.read().await.cycles, 3);
        assert_eq!(
            snapshot.read().await.last_state,
            Some(DeviceConnectivityState::Connected)
        );

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_stops_on_cancel() {
        let sup = supervisor(FixedProbe::new(Some(CONNECTED)), CountingRecovery::new(false));
        let cancel = CancellationToken::new();
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), sup.run(cancel))
            .await
            .expect("supervisor should exit promptly once cancelled");
    }
}
