//! Reachability monitor.
//!
//! A single task probes the host on a fixed interval and edits the status
//! display only when the observed state changes. The last observed state
//! lives in [`MonitorState`], which only the monitor task ever touches.
//! Other tasks talk to it through a [`MonitorHandle`]: they can ask for the
//! state to be forgotten (after the display was recreated) and read the
//! last published status.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::device::DeviceStore;
use crate::display::{self, DisplayError, DisplayRenderer, HostStatus};
use crate::probe::ReachabilityProber;

/// Default time between two probes.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Change-detection state, owned by the monitor task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorState {
    /// `None` until the first successful emission, and again after a reset.
    pub last_known_online: Option<bool>,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Device not initialized or no display bound.
    Skipped,
    /// The probe errored or timed out.
    ProbeFailed,
    /// Same state as last time; nothing was edited.
    Unchanged,
    /// The display was updated to this status.
    Emitted(HostStatus),
    /// The bound message no longer exists.
    BindingMissing,
    /// The display edit failed for another reason.
    DisplayFailed,
}

/// Cross-task handle to a running monitor.
#[derive(Clone)]
pub struct MonitorHandle {
    reset_tx: Arc<watch::Sender<u64>>,
    status_rx: watch::Receiver<Option<HostStatus>>,
}

impl MonitorHandle {
    /// Makes the next tick announce the current state unconditionally.
    pub fn request_reset(&self) {
        self.reset_tx.send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    /// Last status the monitor rendered, if any.
    pub fn last_status(&self) -> Option<HostStatus> {
        *self.status_rx.borrow()
    }

    /// Receiver that wakes on every published status change.
    pub fn subscribe(&self) -> watch::Receiver<Option<HostStatus>> {
        self.status_rx.clone()
    }
}

/// Periodic prober driving the status display.
pub struct StatusMonitor {
    store: Arc<DeviceStore>,
    prober: Arc<dyn ReachabilityProber>,
    display: Arc<dyn DisplayRenderer>,
    interval: Duration,
    probe_timeout: Duration,
    display_timeout: Duration,
    state: MonitorState,
    reset_rx: watch::Receiver<u64>,
    status_tx: watch::Sender<Option<HostStatus>>,
}

impl StatusMonitor {
    /// Creates the monitor and the handle other tasks use to reach it.
    pub fn new(
        store: Arc<DeviceStore>,
        prober: Arc<dyn ReachabilityProber>,
        display: Arc<dyn DisplayRenderer>,
        interval: Duration,
        probe_timeout: Duration,
        display_timeout: Duration,
    ) -> (Self, MonitorHandle) {
        let (reset_tx, reset_rx) = watch::channel(0u64);
        let (status_tx, status_rx) = watch::channel(None);

        let monitor = Self {
            store,
            prober,
            display,
            interval,
            probe_timeout,
            display_timeout,
            state: MonitorState::default(),
            reset_rx,
            status_tx,
        };
        let handle = MonitorHandle {
            reset_tx: Arc::new(reset_tx),
            status_rx,
        };
        (monitor, handle)
    }

    /// Current change-detection state.
    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Runs ticks until `shutdown` is cancelled.
    ///
    /// The first tick fires immediately. A tick in progress is allowed to
    /// finish; cancellation is observed between ticks.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!("Status monitor started (interval {:?})", self.interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let outcome = self.tick().await;
                    debug!(?outcome, "Monitor tick finished");
                }
            }
        }
        info!("Status monitor stopped");
    }

    /// Performs one probe-and-maybe-emit cycle.
    pub async fn tick(&mut self) -> TickOutcome {
        if self.reset_rx.has_changed().unwrap_or(false) {
            self.reset_rx.borrow_and_update();
            self.state.last_known_online = None;
            self.status_tx.send_replace(None);
            debug!("Monitor state reset");
        }

        let record = match self.store.load().await {
            Ok(record) => record,
            Err(e) => {
                warn!("Monitor could not read device record: {}", e);
                return TickOutcome::Skipped;
            }
        };

        let (Some(target), Some(binding)) = (record.target(), record.binding()) else {
            return TickOutcome::Skipped;
        };
        if record.authorized_users().is_empty() {
            return TickOutcome::Skipped;
        }

        let reachable = match tokio::time::timeout(
            self.probe_timeout,
            self.prober.probe(target.ip_address),
        )
        .await
        {
            Ok(Ok(reachable)) => reachable,
            Ok(Err(e)) => {
                warn!(host = %target.ip_address, "Probe failed: {}", e);
                return TickOutcome::ProbeFailed;
            }
            Err(_) => {
                warn!(host = %target.ip_address, "Probe timed out after {:?}", self.probe_timeout);
                return TickOutcome::ProbeFailed;
            }
        };

        if self.state.last_known_online == Some(reachable) {
            return TickOutcome::Unchanged;
        }

        let status = HostStatus::from_reachable(reachable);
        match display::bounded(self.display_timeout, self.display.edit(binding, status)).await {
            Ok(()) => {
                self.state.last_known_online = Some(status.is_online());
                self.status_tx.send_replace(Some(status));
                info!(host = %target.ip_address, "Host is now {}", status);
                TickOutcome::Emitted(status)
            }
            Err(DisplayError::NotFound) => {
                warn!(
                    channel = %binding.channel_id,
                    message = %binding.message_id,
                    "Status display is gone; recreate it to resume updates"
                );
                TickOutcome::BindingMissing
            }
            Err(e) => {
                warn!("Failed to update status display: {}", e);
                TickOutcome::DisplayFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DisplayBinding, WakeTarget};
    use crate::display::DisplayFuture;
    use crate::probe::ProbeError;
    use protocol::{ChannelId, Credential, MessageId, UserId};
    use std::collections::VecDeque;
    use std::future::Future;
    use std::net::IpAddr;
    use std::pin::Pin;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replays scripted probe answers; `None` means the probe errors.
    struct ScriptedProber(Mutex<VecDeque<Option<bool>>>);

    impl ScriptedProber {
        fn new(script: &[Option<bool>]) -> Arc<Self> {
            Arc::new(Self(Mutex::new(script.iter().copied().collect())))
        }
    }

    impl ReachabilityProber for ScriptedProber {
        fn probe(&self, _host: IpAddr) -> Pin<Box<dyn Future<Output = Result<bool, ProbeError>> + Send + '_>> {
            let next = self.0.lock().unwrap().pop_front().flatten();
            Box::pin(async move {
                next.ok_or_else(|| ProbeError::Io(std::io::Error::other("no route to host")))
            })
        }
    }

    #[derive(Default)]
    struct RecordingDisplay {
        edits: Mutex<Vec<HostStatus>>,
        missing: bool,
    }

    impl DisplayRenderer for RecordingDisplay {
        fn post(&self, _channel: ChannelId, _status: Option<HostStatus>) -> DisplayFuture<'_, MessageId> {
            Box::pin(async { Ok(MessageId(1)) })
        }

        fn edit(&self, _binding: DisplayBinding, status: HostStatus) -> DisplayFuture<'_, ()> {
            let missing = self.missing;
            if !missing {
                self.edits.lock().unwrap().push(status);
            }
            Box::pin(async move {
                if missing {
                    Err(DisplayError::NotFound)
                } else {
                    Ok(())
                }
            })
        }

        fn delete(&self, _binding: DisplayBinding) -> DisplayFuture<'_, ()> {
            Box::pin(async { Ok(()) })
        }
    }

    async fn bound_store(dir: &TempDir) -> Arc<DeviceStore> {
        let store = Arc::new(DeviceStore::in_data_dir(dir.path()));
        store
            .transact(|record| {
                record.provision(
                    WakeTarget {
                        mac_address: "AA:BB:CC:DD:EE:FF".parse().unwrap(),
                        ip_address: "10.0.0.5".parse().unwrap(),
                        credential: Credential::new("abc123").unwrap(),
                    },
                    UserId(1),
                );
                record.set_binding(DisplayBinding {
                    channel_id: ChannelId(10),
                    message_id: MessageId(20),
                });
                Ok::<_, crate::device::StoreError>(())
            })
            .await
            .unwrap();
        store
    }

    fn monitor(
        store: Arc<DeviceStore>,
        prober: Arc<ScriptedProber>,
        display: Arc<RecordingDisplay>,
    ) -> (StatusMonitor, MonitorHandle) {
        StatusMonitor::new(
            store,
            prober,
            display,
            Duration::from_millis(10),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_emits_only_on_transitions() {
        let dir = TempDir::new().unwrap();
        let store = bound_store(&dir).await;
        let prober = ScriptedProber::new(&[Some(true), Some(true), Some(false), Some(false), Some(true)]);
        let display = Arc::new(RecordingDisplay::default());
        let (mut monitor, handle) = monitor(store, prober, display.clone());

        let mut outcomes = Vec::new();
        for _ in 0..5 {
            outcomes.push(monitor.tick().await);
        }

        assert_eq!(
            outcomes,
            vec![
                TickOutcome::Emitted(HostStatus::Online),
                TickOutcome::Unchanged,
                TickOutcome::Emitted(HostStatus::Offline),
                TickOutcome::Unchanged,
                TickOutcome::Emitted(HostStatus::Online),
            ]
        );
        assert_eq!(display.edits.lock().unwrap().len(), 3);
        assert_eq!(handle.last_status(), Some(HostStatus::Online));
    }

    #[tokio::test]
    async fn test_reset_forces_next_emission() {
        let dir = TempDir::new().unwrap();
        let store = bound_store(&dir).await;
        let prober = ScriptedProber::new(&[Some(false), Some(false), Some(false)]);
        let display = Arc::new(RecordingDisplay::default());
        let (mut monitor, handle) = monitor(store, prober, display.clone());

        assert_eq!(monitor.tick().await, TickOutcome::Emitted(HostStatus::Offline));
        assert_eq!(monitor.tick().await, TickOutcome::Unchanged);

        handle.request_reset();
        assert_eq!(monitor.tick().await, TickOutcome::Emitted(HostStatus::Offline));
        assert_eq!(display.edits.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_skips_without_binding() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(DeviceStore::in_data_dir(dir.path()));
        store
            .transact(|record| {
                record.provision(
                    WakeTarget {
                        mac_address: "AA:BB:CC:DD:EE:FF".parse().unwrap(),
                        ip_address: "10.0.0.5".parse().unwrap(),
                        credential: Credential::new("abc123").unwrap(),
                    },
                    UserId(1),
                );
                Ok::<_, crate::device::StoreError>(())
            })
            .await
            .unwrap();
        let prober = ScriptedProber::new(&[Some(true)]);
        let display = Arc::new(RecordingDisplay::default());
        let (mut monitor, _handle) = monitor(store, prober, display.clone());

        assert_eq!(monitor.tick().await, TickOutcome::Skipped);
        assert!(display.edits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_skips_uninitialized() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(DeviceStore::in_data_dir(dir.path()));
        let prober = ScriptedProber::new(&[Some(true)]);
        let (mut monitor, _handle) = monitor(store, prober, Arc::new(RecordingDisplay::default()));

        assert_eq!(monitor.tick().await, TickOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_probe_failure_keeps_state() {
        let dir = TempDir::new().unwrap();
        let store = bound_store(&dir).await;
        let prober = ScriptedProber::new(&[Some(true), None, Some(true)]);
        let display = Arc::new(RecordingDisplay::default());
        let (mut monitor, _handle) = monitor(store, prober, display.clone());

        assert_eq!(monitor.tick().await, TickOutcome::Emitted(HostStatus::Online));
        assert_eq!(monitor.tick().await, TickOutcome::ProbeFailed);
        assert_eq!(monitor.state().last_known_online, Some(true));
        assert_eq!(monitor.tick().await, TickOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_missing_message_is_not_repaired() {
        let dir = TempDir::new().unwrap();
        let store = bound_store(&dir).await;
        let before = store.load().await.unwrap();
        let prober = ScriptedProber::new(&[Some(true), Some(true)]);
        let display = Arc::new(RecordingDisplay {
            missing: true,
            ..Default::default()
        });
        let (mut monitor, handle) = monitor(store.clone(), prober, display);

        assert_eq!(monitor.tick().await, TickOutcome::BindingMissing);
        assert_eq!(monitor.state().last_known_online, None);
        assert_eq!(handle.last_status(), None);
        assert_eq!(monitor.tick().await, TickOutcome::BindingMissing);
        assert_eq!(store.load().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let dir = TempDir::new().unwrap();
        let store = bound_store(&dir).await;
        let prober = ScriptedProber::new(&[Some(true)]);
        let display = Arc::new(RecordingDisplay::default());
        let (monitor, handle) = monitor(store, prober, display);

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(monitor.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(handle.last_status(), Some(HostStatus::Online));
    }
}
