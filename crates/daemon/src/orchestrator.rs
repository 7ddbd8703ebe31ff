//! Daemon orchestrator for wiring together all components.
//!
//! The orchestrator owns the device store, builds the wake sender, prober
//! and display from the configuration, and runs two long-lived tasks: the
//! status monitor and the IPC accept loop. Both stop when the shutdown
//! token is cancelled, either by [`DaemonOrchestrator::stop`] or by a
//! client sending `Stop`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, WakeMethod};
use crate::device::DeviceStore;
use crate::display::{DisabledDisplay, DiscordDisplay, DisplayRenderer, HostStatus};
use crate::ipc::{get_socket_path, IpcServer, RequestHandler};
use crate::monitor::{MonitorHandle, StatusMonitor};
use crate::power::PowerOn;
use crate::probe::{PingProber, ReachabilityProber};
use crate::service::WakeService;
use crate::wake::{CommandWakeSender, UdpWakeSender, WakeSender};

/// How long `stop` waits for the background tasks to finish.
const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Daemon orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// Initial state, not started.
    Stopped,
    /// Starting up, initializing components.
    Starting,
    /// Running and accepting commands.
    Running,
    /// Shutting down gracefully.
    ShuttingDown,
}

/// Events emitted by the orchestrator.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    /// Orchestrator state changed.
    StateChanged(OrchestratorState),
    /// The monitor rendered a new host status (`None` after a reset).
    HostStatusChanged(Option<HostStatus>),
    /// Error occurred.
    Error { message: String },
}

/// External systems the daemon talks to.
pub struct Collaborators {
    pub sender: Arc<dyn WakeSender>,
    pub prober: Arc<dyn ReachabilityProber>,
    pub display: Arc<dyn DisplayRenderer>,
}

impl Collaborators {
    /// Builds the production collaborators described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let sender: Arc<dyn WakeSender> = match config.wake.method {
            WakeMethod::Udp => {
                let udp = UdpWakeSender::new(config.wake.destination()?);
                info!("Wake method: UDP broadcast to {}", udp.destination());
                Arc::new(udp)
            }
            WakeMethod::Command => {
                info!("Wake method: command `{}`", config.wake.command);
                Arc::new(CommandWakeSender::new(config.wake.command.clone()))
            }
        };

        let display: Arc<dyn DisplayRenderer> = match config.display.token() {
            Some(token) => Arc::new(
                DiscordDisplay::new(&config.display.api_base, token, config.display.timeout())
                    .context("Failed to create display client")?,
            ),
            None => {
                warn!("No bot token configured; status display is disabled");
                Arc::new(DisabledDisplay)
            }
        };

        Ok(Self {
            sender,
            prober: Arc::new(PingProber::with_program(
                config.monitor.ping_command.clone(),
                config.monitor.ping_wait(),
            )),
            display,
        })
    }
}

/// Daemon orchestrator that manages all subsystems.
pub struct DaemonOrchestrator {
    /// Current state.
    state: Arc<RwLock<OrchestratorState>>,
    /// Shared device record.
    store: Arc<DeviceStore>,
    /// Command entry point shared with the IPC handler.
    service: Arc<WakeService>,
    /// Taken when the monitor task is spawned.
    monitor: Option<StatusMonitor>,
    /// Handle to the monitor task.
    monitor_handle: MonitorHandle,
    /// Where the IPC socket is bound.
    socket_path: PathBuf,
    /// Background tasks, joined on stop.
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
    /// Event sender.
    event_tx: broadcast::Sender<OrchestratorEvent>,
}

impl DaemonOrchestrator {
    /// Creates an orchestrator with collaborators built from `config`.
    pub fn new(config: Config) -> Result<Self> {
        let collaborators = Collaborators::from_config(&config)?;
        Ok(Self::with_collaborators(config, collaborators))
    }

    /// Creates an orchestrator around the given collaborators.
    pub fn with_collaborators(config: Config, collaborators: Collaborators) -> Self {
        let store = Arc::new(DeviceStore::in_data_dir(&config.daemon.data_dir));
        debug!("Device record at {:?}", store.path());

        let (monitor, monitor_handle) = StatusMonitor::new(
            Arc::clone(&store),
            collaborators.prober,
            Arc::clone(&collaborators.display),
            config.monitor.interval(),
            config.monitor.probe_timeout(),
            config.display.timeout(),
        );

        let service = Arc::new(WakeService::new(
            Arc::clone(&store),
            PowerOn::new(collaborators.sender, config.wake.timeout()),
            collaborators.display,
            config.display.timeout(),
            monitor_handle.clone(),
        ));

        let (event_tx, _) = broadcast::channel(64);

        Self {
            state: Arc::new(RwLock::new(OrchestratorState::Stopped)),
            store,
            service,
            monitor: Some(monitor),
            monitor_handle,
            socket_path: get_socket_path(),
            tasks: Mutex::new(Vec::new()),
            shutdown_token: CancellationToken::new(),
            event_tx,
        }
    }

    /// Overrides the IPC socket location.
    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }

    /// Returns the current state.
    pub async fn state(&self) -> OrchestratorState {
        *self.state.read().await
    }

    /// Returns a receiver for orchestrator events.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.event_tx.subscribe()
    }

    /// Starts the monitor and the IPC server.
    pub async fn start(&mut self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state != OrchestratorState::Stopped {
                anyhow::bail!("Orchestrator is already running");
            }
            *state = OrchestratorState::Starting;
        }
        self.emit_event(OrchestratorEvent::StateChanged(OrchestratorState::Starting));

        info!("Starting daemon orchestrator...");

        // Creates the default record on first start.
        self.store
            .load()
            .await
            .context("Failed to load device record")?;

        let server = IpcServer::bind(&self.socket_path)
            .await
            .with_context(|| format!("Failed to bind IPC socket {:?}", self.socket_path))?;

        let monitor = self
            .monitor
            .take()
            .context("Orchestrator cannot be restarted after stop")?;

        let mut tasks = self.tasks.lock().await;

        tasks.push(tokio::spawn(monitor.run(self.shutdown_token.clone())));
        debug!("Started status monitor task");

        let handler = RequestHandler::new(Arc::clone(&self.service), self.shutdown_token.clone());
        tasks.push(tokio::spawn(handler.serve(server)));
        debug!("Started IPC server task");

        tasks.push(tokio::spawn(Self::forward_status(
            self.monitor_handle.clone(),
            self.event_tx.clone(),
            self.shutdown_token.clone(),
        )));
        drop(tasks);

        {
            let mut state = self.state.write().await;
            *state = OrchestratorState::Running;
        }
        self.emit_event(OrchestratorEvent::StateChanged(OrchestratorState::Running));

        info!("Daemon orchestrator started successfully");
        Ok(())
    }

    /// Republishes monitor status changes as events.
    async fn forward_status(
        handle: MonitorHandle,
        event_tx: broadcast::Sender<OrchestratorEvent>,
        shutdown: CancellationToken,
    ) {
        let mut status_rx = handle.subscribe();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = *status_rx.borrow_and_update();
                    let _ = event_tx.send(OrchestratorEvent::HostStatusChanged(status));
                }
            }
        }
    }

    /// Stops the orchestrator gracefully.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state == OrchestratorState::Stopped {
                return Ok(());
            }
            if *state == OrchestratorState::ShuttingDown {
                anyhow::bail!("Orchestrator is already shutting down");
            }
            *state = OrchestratorState::ShuttingDown;
        }
        self.emit_event(OrchestratorEvent::StateChanged(
            OrchestratorState::ShuttingDown,
        ));

        info!("Stopping daemon orchestrator...");

        self.shutdown_token.cancel();

        let tasks: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            match tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Background task failed: {}", e);
                    self.emit_event(OrchestratorEvent::Error {
                        message: format!("background task failed: {}", e),
                    });
                }
                Err(_) => warn!("Background task did not stop within {:?}", TASK_SHUTDOWN_TIMEOUT),
            }
        }

        {
            let mut state = self.state.write().await;
            *state = OrchestratorState::Stopped;
        }
        self.emit_event(OrchestratorEvent::StateChanged(OrchestratorState::Stopped));

        info!("Daemon orchestrator stopped");
        Ok(())
    }

    /// Emits an orchestrator event.
    fn emit_event(&self, event: OrchestratorEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Returns the command service.
    pub fn service(&self) -> &Arc<WakeService> {
        &self.service
    }

    /// Returns the device store.
    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.store
    }

    /// Returns the IPC socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Returns the shutdown token for external tasks to observe shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }
}
