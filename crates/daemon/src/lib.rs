//! # pcwake Daemon Library
//!
//! Power on a single machine over the LAN on behalf of a small set of
//! authorized chat users, and keep a chat message up to date with whether
//! that machine is reachable.
//!
//! ## Overview
//!
//! - **Device record**: MAC, IP, a 6-character password, the authorized
//!   users and the location of the status display, persisted as one JSON file
//! - **Access control**: every command checks initialization and membership
//! - **Power-on**: password check followed by exactly one Wake-on-LAN dispatch
//! - **Status monitor**: periodic ping that edits the display only on change
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Daemon Orchestrator                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐      ┌──────────────────────────────────┐  │
//! │  │  IPC server  │ ───▶ │           WakeService            │  │
//! │  └──────────────┘      │  access · power · display glue   │  │
//! │                        └──────────────────────────────────┘  │
//! │  ┌──────────────┐                     │                      │
//! │  │StatusMonitor │ ──── reset ◀────────┘                      │
//! │  └──────────────┘                                            │
//! │          │                      ┌──────────────────────┐     │
//! │          └────────────────────▶ │     DeviceStore      │     │
//! │                                 └──────────────────────┘     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use daemon::{Config, DaemonOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!
//!     let mut orchestrator = DaemonOrchestrator::new(config)?;
//!     orchestrator.start().await?;
//!
//!     orchestrator.shutdown_token().cancelled().await;
//!     orchestrator.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`device`]: The persisted device record and its store
//! - [`access`]: Initialization and authorization checks
//! - [`power`]: Password-gated wake dispatch
//! - [`monitor`]: Reachability polling and change detection
//! - [`display`]: Status display rendering
//! - [`wake`] / [`probe`]: Wake signal and reachability primitives
//! - [`service`]: Commands exposed to the front end
//! - [`ipc`]: CLI-daemon socket protocol
//! - [`orchestrator`]: Main daemon coordinator

pub mod access;
pub mod config;
pub mod device;
pub mod display;
pub mod error;
pub mod ipc;
pub mod monitor;
pub mod orchestrator;
pub mod power;
pub mod probe;
pub mod service;
pub mod wake;

// Re-export protocol for convenience
pub use protocol;

pub use config::Config;
pub use device::{DeviceRecord, DeviceStore, DisplayBinding, StoreError, WakeTarget};
pub use display::{DisplayError, DisplayRenderer, HostStatus};
pub use error::{ServiceError, ServiceResult};
pub use monitor::{MonitorHandle, StatusMonitor, TickOutcome};
pub use orchestrator::{DaemonOrchestrator, OrchestratorEvent, OrchestratorState};
pub use power::{Ack, PowerOn};
pub use probe::{ProbeError, ReachabilityProber};
pub use service::{DeviceInfo, WakeService};
pub use wake::{WakeError, WakeSender};
