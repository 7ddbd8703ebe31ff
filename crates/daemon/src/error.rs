//! Error type for the operations the daemon exposes to callers.

use protocol::ProtocolError;
use thiserror::Error;

use crate::device::StoreError;
use crate::display::DisplayError;

/// Failure of a single command.
///
/// Every variant is scoped to the invocation that produced it; none of
/// them is fatal to the process.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed MAC, IP or password supplied by the caller.
    #[error("{0}")]
    Validation(#[from] ProtocolError),

    /// The device has not been set up yet.
    #[error("device is not initialized, run `init` first")]
    NotInitialized,

    /// The caller is not on the authorization list.
    #[error("permission denied")]
    Forbidden,

    /// The submitted password did not match.
    #[error("invalid password")]
    InvalidCredential,

    /// The wake signal could not be sent.
    #[error("failed to send WOL packet: {0}")]
    DispatchFailed(String),

    /// The user to add is already authorized.
    #[error("user {0} has already been added")]
    AlreadyPresent(protocol::UserId),

    /// The user to remove is not authorized.
    #[error("user {0} has not been added")]
    NotPresent(protocol::UserId),

    /// Removing the user would leave the device without an owner.
    #[error("cannot remove the last authorized user")]
    LastAuthorizedUser,

    /// Posting or deleting the status display failed.
    #[error("display error: {0}")]
    Display(#[from] DisplayError),

    /// The device record could not be read or written.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl ServiceError {
    /// Stable machine-readable name, forwarded over IPC.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation",
            ServiceError::NotInitialized => "not_initialized",
            ServiceError::Forbidden => "forbidden",
            ServiceError::InvalidCredential => "invalid_credential",
            ServiceError::DispatchFailed(_) => "dispatch_failed",
            ServiceError::AlreadyPresent(_) => "already_present",
            ServiceError::NotPresent(_) => "not_present",
            ServiceError::LastAuthorizedUser => "last_user",
            ServiceError::Display(_) => "display",
            ServiceError::Storage(_) => "storage",
        }
    }
}

/// Result type alias for service operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
