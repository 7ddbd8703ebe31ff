//! IPC message types for CLI-daemon communication.
//!
//! Every command that touches the device record is executed inside the
//! daemon, so the CLI never opens the record file itself.

use protocol::{ChannelId, UserId};
use serde::{Deserialize, Serialize};

use crate::device::DisplayBinding;
use crate::display::HostStatus;
use crate::error::ServiceError;
use crate::service::DeviceInfo;

/// Request sent from the CLI to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum IpcRequest {
    /// Liveness check.
    Ping,

    /// Daemon and host status.
    Status,

    /// Graceful shutdown.
    Stop,

    /// Set MAC, IP and password.
    Initialize {
        caller: UserId,
        mac_address: String,
        ip_address: String,
        password: String,
    },

    /// Authorize another user.
    AddUser { caller: UserId, user: UserId },

    /// Revoke a user.
    RemoveUser { caller: UserId, user: UserId },

    /// (Re)create the status display in a channel.
    CreateButton { caller: UserId, channel: ChannelId },

    /// Submit the password and wake the host.
    TurnOn { caller: UserId, password: String },

    /// Show the device record.
    Info { caller: UserId },
}

impl IpcRequest {
    /// Short name for logging; never includes a password.
    pub fn name(&self) -> &'static str {
        match self {
            IpcRequest::Ping => "ping",
            IpcRequest::Status => "status",
            IpcRequest::Stop => "stop",
            IpcRequest::Initialize { .. } => "init",
            IpcRequest::AddUser { .. } => "add-user",
            IpcRequest::RemoveUser { .. } => "remove-user",
            IpcRequest::CreateButton { .. } => "create-button",
            IpcRequest::TurnOn { .. } => "turn-on",
            IpcRequest::Info { .. } => "info",
        }
    }
}

/// Response sent from the daemon to the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum IpcResponse {
    Pong,

    Status {
        running: bool,
        uptime_secs: u64,
        initialized: bool,
        host_status: Option<HostStatus>,
    },

    Stopping,

    /// A command succeeded; `message` is shown to the user.
    Done { message: String },

    Info { info: DeviceInfo },

    ButtonCreated { binding: DisplayBinding },

    /// A command failed. `kind` is [`ServiceError::kind`] or an
    /// IPC-level kind such as `bad_request`.
    Error { kind: String, message: String },
}

impl IpcResponse {
    pub fn done(message: impl Into<String>) -> Self {
        IpcResponse::Done {
            message: message.into(),
        }
    }

    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        IpcResponse::Error {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl From<ServiceError> for IpcResponse {
    fn from(err: ServiceError) -> Self {
        IpcResponse::error(err.kind(), err.to_string())
    }
}
