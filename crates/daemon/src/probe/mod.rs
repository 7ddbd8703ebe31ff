//! Host reachability probing.

mod ping;

use std::future::Future;
use std::io;
use std::net::IpAddr;
use std::pin::Pin;

use thiserror::Error;

pub use ping::PingProber;

/// The probe could not produce an answer at all.
///
/// An unreachable host is *not* an error; it is `Ok(false)`.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to run probe: {0}")]
    Io(#[from] io::Error),
}

/// Performs exactly one liveness check against a host.
pub trait ReachabilityProber: Send + Sync {
    fn probe(&self, host: IpAddr) -> Pin<Box<dyn Future<Output = Result<bool, ProbeError>> + Send + '_>>;
}
