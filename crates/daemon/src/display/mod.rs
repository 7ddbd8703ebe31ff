//! Status display module.
//!
//! The display is one chat message carrying the "Turn On PC" button and,
//! once the host has been probed, an embed saying whether it is online.
//! This module defines the renderer interface the monitor and the service
//! talk to:
//! - [`discord`]: renders into a Discord channel over the REST API
//! - [`DisabledDisplay`]: used when no chat credentials are configured

pub mod discord;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use protocol::{ChannelId, MessageId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::DisplayBinding;

pub use discord::DiscordDisplay;

/// Last observed reachability of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Online,
    Offline,
}

impl HostStatus {
    /// Maps a probe result to a status.
    pub fn from_reachable(reachable: bool) -> Self {
        if reachable {
            HostStatus::Online
        } else {
            HostStatus::Offline
        }
    }

    /// True for [`HostStatus::Online`].
    pub fn is_online(self) -> bool {
        self == HostStatus::Online
    }

    /// Headline shown on the display.
    pub fn title(self) -> &'static str {
        match self {
            HostStatus::Online => "🟢 PC is online",
            HostStatus::Offline => "🔴 PC is offline",
        }
    }

    /// Accent colour (RGB) shown on the display.
    pub fn color(self) -> u32 {
        match self {
            HostStatus::Online => 0x00ff00,
            HostStatus::Offline => 0xff0000,
        }
    }
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostStatus::Online => write!(f, "online"),
            HostStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Errors returned by a display renderer.
#[derive(Debug, Error)]
pub enum DisplayError {
    /// The bound message (or its channel) no longer exists.
    #[error("display message not found")]
    NotFound,

    /// The chat service refused the request.
    #[error("chat service returned {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The request never got a usable answer.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The chat service answered with something unexpected.
    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    /// The call did not finish in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// No renderer is configured.
    #[error("no chat display is configured (set display.bot_token)")]
    Disabled,
}

/// Boxed future returned by renderer methods.
pub type DisplayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DisplayError>> + Send + 'a>>;

/// Posts, edits and deletes the status display.
///
/// `status` is `None` for a freshly posted display that has not been
/// probed yet: only the button is shown.
pub trait DisplayRenderer: Send + Sync {
    /// Posts a new display into `channel` and returns its message id.
    fn post(&self, channel: ChannelId, status: Option<HostStatus>) -> DisplayFuture<'_, MessageId>;

    /// Rewrites the bound display to show `status`.
    fn edit(&self, binding: DisplayBinding, status: HostStatus) -> DisplayFuture<'_, ()>;

    /// Deletes the bound display.
    fn delete(&self, binding: DisplayBinding) -> DisplayFuture<'_, ()>;
}

/// Runs a renderer call with a deadline; timing out counts as failure.
pub async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, DisplayError>>,
) -> Result<T, DisplayError> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| DisplayError::Timeout(limit))?
}

/// Renderer that refuses every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledDisplay;

impl DisplayRenderer for DisabledDisplay {
    fn post(&self, _channel: ChannelId, _status: Option<HostStatus>) -> DisplayFuture<'_, MessageId> {
        Box::pin(async { Err(DisplayError::Disabled) })
    }

    fn edit(&self, _binding: DisplayBinding, _status: HostStatus) -> DisplayFuture<'_, ()> {
        Box::pin(async { Err(DisplayError::Disabled) })
    }

    fn delete(&self, _binding: DisplayBinding) -> DisplayFuture<'_, ()> {
        Box::pin(async { Err(DisplayError::Disabled) })
    }
}
