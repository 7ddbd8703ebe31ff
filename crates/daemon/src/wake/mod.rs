//! Wake signal dispatch.
//!
//! Two senders are provided:
//! - [`UdpWakeSender`]: builds the magic packet itself and broadcasts it
//! - [`CommandWakeSender`]: delegates to an external tool such as `wakeonlan`

mod command;
mod udp;

use std::future::Future;
use std::io;
use std::pin::Pin;

use protocol::MacAddress;
use thiserror::Error;

pub use command::CommandWakeSender;
pub use udp::UdpWakeSender;

/// Errors raised while sending a wake signal.
#[derive(Debug, Error)]
pub enum WakeError {
    /// Socket or process I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Fewer bytes than a full packet left the socket.
    #[error("short send: {sent} of {expected} bytes")]
    ShortSend { sent: usize, expected: usize },

    /// The external command exited unsuccessfully.
    #[error("`{program}` exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },
}

/// Sends one wake signal to a hardware address.
///
/// Implementations make a single attempt; retrying is left to the caller.
pub trait WakeSender: Send + Sync {
    fn send<'a>(
        &'a self,
        mac: &'a MacAddress,
    ) -> Pin<Box<dyn Future<Output = Result<(), WakeError>> + Send + 'a>>;
}
