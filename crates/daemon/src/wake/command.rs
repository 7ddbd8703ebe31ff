//! Wake signal through an external program.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use protocol::MacAddress;
use tokio::process::Command;

use super::{WakeError, WakeSender};

/// Runs `<program> <MAC>` and treats a non-zero exit as failure.
#[derive(Debug, Clone)]
pub struct CommandWakeSender {
    program: String,
}

impl CommandWakeSender {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, mac: &MacAddress) -> Result<(), WakeError> {
        let output = Command::new(&self.program)
            .arg(mac.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(WakeError::CommandFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        tracing::info!(mac = %mac, program = %self.program, "Sent wake signal");
        Ok(())
    }
}

impl WakeSender for CommandWakeSender {
    fn send<'a>(
        &'a self,
        mac: &'a MacAddress,
    ) -> Pin<Box<dyn Future<Output = Result<(), WakeError>> + Send + 'a>> {
        Box::pin(self.run(mac))
    }
}
