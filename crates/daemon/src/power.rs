//! Password-gated power-on.
//!
//! One invocation runs strictly in order: access check, password check,
//! a single wake dispatch. Nothing is persisted and nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use protocol::{MacAddress, UserId};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::access;
use crate::device::DeviceRecord;
use crate::error::{ServiceError, ServiceResult};
use crate::wake::WakeSender;

/// Fixed acknowledgement returned after a successful dispatch.
pub const ACK_MESSAGE: &str = "Password has been authorized. WOL packet has been sent.";

/// Proof that a wake signal left the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Address the packet was sent to.
    pub mac_address: MacAddress,
    /// Human-readable confirmation.
    pub message: String,
}

/// Runs the power-on protocol against a record snapshot.
#[derive(Clone)]
pub struct PowerOn {
    sender: Arc<dyn WakeSender>,
    timeout: Duration,
}

impl PowerOn {
    /// `timeout` bounds the dispatch; hitting it counts as a failed dispatch.
    pub fn new(sender: Arc<dyn WakeSender>, timeout: Duration) -> Self {
        Self { sender, timeout }
    }

    /// Checks the caller and the submitted password, then sends one packet.
    pub async fn authenticate(
        &self,
        record: &DeviceRecord,
        caller: UserId,
        submitted: &str,
    ) -> ServiceResult<Ack> {
        access::ensure_ready(record, caller)?;
        let target = record.target().ok_or(ServiceError::NotInitialized)?;

        if !target.credential.matches(submitted) {
            warn!(user = %caller, "Rejected power-on: invalid password");
            return Err(ServiceError::InvalidCredential);
        }

        match tokio::time::timeout(self.timeout, self.sender.send(&target.mac_address)).await {
            Ok(Ok(())) => {
                info!(user = %caller, mac = %target.mac_address, "Power-on dispatched");
                Ok(Ack {
                    mac_address: target.mac_address,
                    message: ACK_MESSAGE.to_string(),
                })
            }
            Ok(Err(e)) => {
                warn!(user = %caller, "Power-on dispatch failed: {}", e);
                Err(ServiceError::DispatchFailed(e.to_string()))
            }
            Err(_) => {
                warn!(user = %caller, "Power-on dispatch timed out after {:?}", self.timeout);
                Err(ServiceError::DispatchFailed(format!(
                    "timed out after {:?}",
                    self.timeout
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::WakeTarget;
    use crate::wake::WakeError;
    use protocol::Credential;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSender {
        calls: AtomicUsize,
        fail: bool,
        hang: bool,
    }

    impl WakeSender for CountingSender {
        fn send<'a>(
            &'a self,
            _mac: &'a MacAddress,
        ) -> Pin<Box<dyn Future<Output = Result<(), WakeError>> + Send + 'a>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if self.hang {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                if self.fail {
                    return Err(WakeError::Io(std::io::Error::other("network down")));
                }
                Ok(())
            })
        }
    }

    fn record_owned_by(owner: UserId) -> DeviceRecord {
        let mut record = DeviceRecord::default();
        record.provision(
            WakeTarget {
                mac_address: "AA:BB:CC:DD:EE:FF".parse().unwrap(),
                ip_address: "10.0.0.5".parse().unwrap(),
                credential: Credential::new("abc123").unwrap(),
            },
            owner,
        );
        record
    }

    fn power_on(sender: Arc<CountingSender>) -> PowerOn {
        PowerOn::new(sender, Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_correct_password_dispatches_once() {
        let sender = Arc::new(CountingSender::default());
        let ack = power_on(sender.clone())
            .authenticate(&record_owned_by(UserId(1)), UserId(1), "abc123")
            .await
            .unwrap();

        assert_eq!(ack.message, ACK_MESSAGE);
        assert_eq!(ack.mac_address.to_string(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(sender.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wrong_password_never_dispatches() {
        let sender = Arc::new(CountingSender::default());
        let result = power_on(sender.clone())
            .authenticate(&record_owned_by(UserId(1)), UserId(1), "abc124")
            .await;

        assert!(matches!(result, Err(ServiceError::InvalidCredential)));
        assert_eq!(sender.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unauthorized_never_dispatches() {
        let sender = Arc::new(CountingSender::default());
        let result = power_on(sender.clone())
            .authenticate(&record_owned_by(UserId(1)), UserId(2), "abc123")
            .await;

        assert!(matches!(result, Err(ServiceError::Forbidden)));
        assert_eq!(sender.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_uninitialized_never_dispatches() {
        let sender = Arc::new(CountingSender::default());
        let result = power_on(sender.clone())
            .authenticate(&DeviceRecord::default(), UserId(1), "abc123")
            .await;

        assert!(matches!(result, Err(ServiceError::NotInitialized)));
        assert_eq!(sender.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_surfaced() {
        let sender = Arc::new(CountingSender {
            fail: true,
            ..Default::default()
        });
        let result = power_on(sender.clone())
            .authenticate(&record_owned_by(UserId(1)), UserId(1), "abc123")
            .await;

        match result {
            Err(ServiceError::DispatchFailed(message)) => assert!(message.contains("network down")),
            other => panic!("expected DispatchFailed, got {:?}", other),
        }
        assert_eq!(sender.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispatch_timeout_is_failure() {
        let sender = Arc::new(CountingSender {
            hang: true,
            ..Default::default()
        });
        let result = power_on(sender)
            .authenticate(&record_owned_by(UserId(1)), UserId(1), "abc123")
            .await;

        assert!(matches!(result, Err(ServiceError::DispatchFailed(m)) if m.contains("timed out")));
    }
}
