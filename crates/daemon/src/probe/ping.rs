//! ICMP echo via the system `ping` binary.
//!
//! Raw ICMP sockets need privileges the daemon usually does not have;
//! the setuid/capability-enabled `ping` does not.

use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use super::{ProbeError, ReachabilityProber};

/// Sends a single echo request with `ping -c 1 -W <secs> <host>`.
#[derive(Debug, Clone)]
pub struct PingProber {
    program: String,
    wait: Duration,
}

impl PingProber {
    /// `wait` is how long `ping` itself waits for the reply.
    pub fn new(wait: Duration) -> Self {
        Self::with_program("ping", wait)
    }

    pub fn with_program(program: impl Into<String>, wait: Duration) -> Self {
        Self {
            program: program.into(),
            wait,
        }
    }

    fn command(&self, host: IpAddr) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-c")
            .arg("1")
            .arg("-W")
            .arg(self.wait.as_secs().max(1).to_string())
            .arg(host.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }

    async fn run(&self, host: IpAddr) -> Result<bool, ProbeError> {
        let status = self.command(host).status().await?;
        tracing::debug!(%host, %status, "Ping finished");
        Ok(status.success())
    }
}

impl ReachabilityProber for PingProber {
    fn probe(&self, host: IpAddr) -> Pin<Box<dyn Future<Output = Result<bool, ProbeError>> + Send + '_>> {
        Box::pin(self.run(host))
    }
}
