//! Commands exposed to the front end.
//!
//! [`WakeService`] is the only place that combines the device store, the
//! access rules, the power-on protocol and the status display. Every
//! mutation runs inside one store transaction, so a failed command leaves
//! the record file as it was.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use protocol::{ChannelId, MacAddress, UserId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::access;
use crate::device::{DeviceStore, DisplayBinding, Provisioning};
use crate::display::{self, DisplayError, DisplayRenderer, HostStatus};
use crate::error::{ServiceError, ServiceResult};
use crate::monitor::MonitorHandle;
use crate::power::{Ack, PowerOn};

/// What an authorized user sees about the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub mac_address: Option<MacAddress>,
    pub ip_address: Option<IpAddr>,
    pub password: Option<String>,
    pub authorized_users: Vec<UserId>,
    pub binding: Option<DisplayBinding>,
    /// Last status rendered by the monitor.
    pub status: Option<HostStatus>,
}

/// Front-end facing operations.
pub struct WakeService {
    store: Arc<DeviceStore>,
    power: PowerOn,
    display: Arc<dyn DisplayRenderer>,
    display_timeout: Duration,
    monitor: MonitorHandle,
}

impl WakeService {
    pub fn new(
        store: Arc<DeviceStore>,
        power: PowerOn,
        display: Arc<dyn DisplayRenderer>,
        display_timeout: Duration,
        monitor: MonitorHandle,
    ) -> Self {
        Self {
            store,
            power,
            display,
            display_timeout,
            monitor,
        }
    }

    /// Returns the backing store.
    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.store
    }

    /// Sets MAC, IP and password and makes `caller` the only authorized user.
    ///
    /// Inputs are validated before the record is touched. On a fresh device
    /// anyone may do this; afterwards only an authorized user may, and doing
    /// so re-provisions the device.
    pub async fn initialize(
        &self,
        caller: UserId,
        mac: &str,
        ip: &str,
        password: &str,
    ) -> ServiceResult<()> {
        let input = Provisioning::parse(mac, ip, password)?;

        self.store
            .transact(|record| {
                access::ensure_may_initialize(record, caller)?;
                let reprovision = !record.authorized_users().is_empty();
                record.provision(input, caller);
                if reprovision {
                    info!(user = %caller, "Device re-provisioned");
                } else {
                    info!(user = %caller, "Device initialized");
                }
                Ok(())
            })
            .await
    }

    /// Authorizes another user.
    pub async fn add_user(&self, caller: UserId, user: UserId) -> ServiceResult<()> {
        self.store
            .transact(|record| {
                access::ensure_ready(record, caller)?;
                if !record.add_user(user) {
                    return Err(ServiceError::AlreadyPresent(user));
                }
                info!(by = %caller, %user, "User added");
                Ok(())
            })
            .await
    }

    /// Revokes a user.
    ///
    /// The last authorized user cannot be removed: an empty list would mark
    /// the device as never initialized.
    pub async fn remove_user(&self, caller: UserId, user: UserId) -> ServiceResult<()> {
        self.store
            .transact(|record| {
                access::ensure_ready(record, caller)?;
                if !record.is_authorized(user) {
                    return Err(ServiceError::NotPresent(user));
                }
                if record.authorized_users().len() == 1 {
                    return Err(ServiceError::LastAuthorizedUser);
                }
                record.remove_user(user);
                info!(by = %caller, %user, "User removed");
                Ok(())
            })
            .await
    }

    /// Replaces the status display with a fresh one in `channel`.
    ///
    /// The store stays locked across the delete and post calls so the new
    /// binding is persisted in one step. A vanished old display is ignored;
    /// any other failure aborts with the record unchanged.
    pub async fn recreate_display(
        &self,
        caller: UserId,
        channel: ChannelId,
    ) -> ServiceResult<DisplayBinding> {
        let mut tx = self.store.begin().await?;
        access::ensure_ready(tx.record(), caller)?;

        if let Some(old) = tx.record().binding() {
            match display::bounded(self.display_timeout, self.display.delete(old)).await {
                Ok(()) => debug!(message = %old.message_id, "Deleted previous display"),
                Err(DisplayError::NotFound) => {
                    debug!(message = %old.message_id, "Previous display already gone")
                }
                Err(e) => return Err(e.into()),
            }
        }

        let message_id =
            display::bounded(self.display_timeout, self.display.post(channel, None)).await?;
        let binding = DisplayBinding {
            channel_id: channel,
            message_id,
        };

        tx.record_mut().set_binding(binding);
        tx.commit()?;
        self.monitor.request_reset();

        info!(by = %caller, channel = %channel, message = %message_id, "Status display created");
        Ok(binding)
    }

    /// Checks the password and sends one wake signal.
    pub async fn authenticate(&self, caller: UserId, password: &str) -> ServiceResult<Ack> {
        let record = self.store.load().await?;
        self.power.authenticate(&record, caller, password).await
    }

    /// Returns the record as seen by an authorized user.
    pub async fn get_info(&self, caller: UserId) -> ServiceResult<DeviceInfo> {
        let record = self.store.load().await?;
        access::ensure_may_view(&record, caller)?;

        Ok(DeviceInfo {
            mac_address: record.mac_address().copied(),
            ip_address: record.ip_address(),
            password: record.credential().map(|c| c.expose().to_string()),
            authorized_users: record.authorized_users().to_vec(),
            binding: record.binding(),
            status: self.monitor.last_status(),
        })
    }

    /// Last status rendered by the monitor.
    pub fn host_status(&self) -> Option<HostStatus> {
        self.monitor.last_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DisplayFuture;
    use crate::monitor::StatusMonitor;
    use crate::probe::{ProbeError, ReachabilityProber};
    use crate::wake::{WakeError, WakeSender};
    use protocol::MessageId;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct NullSender;

    impl WakeSender for NullSender {
        fn send<'a>(
            &'a self,
            _mac: &'a MacAddress,
        ) -> Pin<Box<dyn Future<Output = Result<(), WakeError>> + Send + 'a>> {
            Box::pin(async { Ok(()) })
        }
    }

    struct UpProber;

    impl ReachabilityProber for UpProber {
        fn probe(&self, _host: IpAddr) -> Pin<Box<dyn Future<Output = Result<bool, ProbeError>> + Send + '_>> {
            Box::pin(async { Ok(true) })
        }
    }

    /// Hands out increasing message ids and records deletions.
    #[derive(Default)]
    struct FakeDisplay {
        next_id: AtomicU64,
        deleted: Mutex<Vec<MessageId>>,
        delete_error: Option<u16>,
    }

    impl DisplayRenderer for FakeDisplay {
        fn post(&self, _channel: ChannelId, _status: Option<HostStatus>) -> DisplayFuture<'_, MessageId> {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 100;
            Box::pin(async move { Ok(MessageId(id)) })
        }

        fn edit(&self, _binding: DisplayBinding, _status: HostStatus) -> DisplayFuture<'_, ()> {
            Box::pin(async { Ok(()) })
        }

        fn delete(&self, binding: DisplayBinding) -> DisplayFuture<'_, ()> {
            let result = match self.delete_error {
                Some(404) => Err(DisplayError::NotFound),
                Some(status) => Err(DisplayError::Rejected {
                    status,
                    message: "Missing Permissions".to_string(),
                }),
                None => {
                    self.deleted.lock().unwrap().push(binding.message_id);
                    Ok(())
                }
            };
            Box::pin(async move { result })
        }
    }

    struct Fixture {
        _dir: TempDir,
        service: WakeService,
        monitor: StatusMonitor,
        display: Arc<FakeDisplay>,
    }

    fn fixture(display: FakeDisplay) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(DeviceStore::in_data_dir(dir.path()));
        let display = Arc::new(display);
        let (monitor, handle) = StatusMonitor::new(
            store.clone(),
            Arc::new(UpProber),
            display.clone(),
            Duration::from_secs(30),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let service = WakeService::new(
            store,
            PowerOn::new(Arc::new(NullSender), Duration::from_secs(1)),
            display.clone(),
            Duration::from_secs(1),
            handle,
        );
        Fixture {
            _dir: dir,
            service,
            monitor,
            display,
        }
    }

    async fn initialized(display: FakeDisplay) -> Fixture {
        let f = fixture(display);
        f.service
            .initialize(UserId(1), "AA:BB:CC:DD:EE:FF", "10.0.0.5", "abc123")
            .await
            .unwrap();
        f
    }

    #[tokio::test]
    async fn test_invalid_mac_leaves_record_untouched() {
        let f = fixture(FakeDisplay::default());
        let before = f.service.store().load().await.unwrap();

        let err = f
            .service
            .initialize(UserId(1), "not-a-mac", "10.0.0.5", "abc123")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "validation");
        assert_eq!(f.service.store().load().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_invalid_ip_and_password_are_rejected() {
        let f = initialized(FakeDisplay::default()).await;
        let before = std::fs::read(f.service.store().path()).unwrap();

        let ip_err = f
            .service
            .initialize(UserId(1), "11:22:33:44:55:66", "10.0.0", "zzz999")
            .await
            .unwrap_err();
        assert!(matches!(ip_err, ServiceError::Validation(_)));
        assert_eq!(std::fs::read(f.service.store().path()).unwrap(), before);

        let password_err = f
            .service
            .initialize(UserId(1), "11:22:33:44:55:66", "10.0.0.6", "abc")
            .await
            .unwrap_err();
        assert!(matches!(password_err, ServiceError::Validation(_)));
        assert_eq!(std::fs::read(f.service.store().path()).unwrap(), before);

        let record = f.service.store().load().await.unwrap();
        assert_eq!(record.ip_address(), Some("10.0.0.5".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_reinitialize_resets_users() {
        let f = initialized(FakeDisplay::default()).await;
        f.service.add_user(UserId(1), UserId(2)).await.unwrap();

        f.service
            .initialize(UserId(2), "11:22:33:44:55:66", "10.0.0.6", "zzz999")
            .await
            .unwrap();

        let info = f.service.get_info(UserId(2)).await.unwrap();
        assert_eq!(info.authorized_users, vec![UserId(2)]);
        assert_eq!(info.password.as_deref(), Some("zzz999"));
        assert!(matches!(
            f.service.get_info(UserId(1)).await,
            Err(ServiceError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_add_user_twice() {
        let f = initialized(FakeDisplay::default()).await;
        f.service.add_user(UserId(1), UserId(2)).await.unwrap();

        let err = f.service.add_user(UserId(1), UserId(2)).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyPresent(UserId(2))));

        let info = f.service.get_info(UserId(1)).await.unwrap();
        assert_eq!(info.authorized_users, vec![UserId(1), UserId(2)]);
    }

    #[tokio::test]
    async fn test_remove_user() {
        let f = initialized(FakeDisplay::default()).await;
        f.service.add_user(UserId(1), UserId(2)).await.unwrap();

        f.service.remove_user(UserId(2), UserId(1)).await.unwrap();
        assert!(matches!(
            f.service.remove_user(UserId(2), UserId(1)).await,
            Err(ServiceError::NotPresent(UserId(1)))
        ));
        assert!(matches!(
            f.service.remove_user(UserId(2), UserId(2)).await,
            Err(ServiceError::LastAuthorizedUser)
        ));
    }

    #[tokio::test]
    async fn test_admin_commands_before_init() {
        let f = fixture(FakeDisplay::default());
        assert!(matches!(
            f.service.add_user(UserId(1), UserId(2)).await,
            Err(ServiceError::NotInitialized)
        ));
        assert!(matches!(
            f.service.recreate_display(UserId(1), ChannelId(5)).await,
            Err(ServiceError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_recreate_display_replaces_binding() {
        let mut f = initialized(FakeDisplay::default()).await;

        let first = f.service.recreate_display(UserId(1), ChannelId(5)).await.unwrap();
        assert_eq!(f.monitor.tick().await, crate::monitor::TickOutcome::Emitted(HostStatus::Online));

        let second = f.service.recreate_display(UserId(1), ChannelId(6)).await.unwrap();
        assert_ne!(first.message_id, second.message_id);
        assert_eq!(*f.display.deleted.lock().unwrap(), vec![first.message_id]);

        let info = f.service.get_info(UserId(1)).await.unwrap();
        assert_eq!(info.binding, Some(second));
        assert_eq!(info.status, Some(HostStatus::Online));

        // The host did not change state, but the fresh display still gets it.
        assert_eq!(f.monitor.tick().await, crate::monitor::TickOutcome::Emitted(HostStatus::Online));
    }

    #[tokio::test]
    async fn test_recreate_display_ignores_vanished_message() {
        let f = initialized(FakeDisplay {
            delete_error: Some(404),
            ..Default::default()
        })
        .await;

        f.service.recreate_display(UserId(1), ChannelId(5)).await.unwrap();
        let second = f.service.recreate_display(UserId(1), ChannelId(5)).await.unwrap();
        assert_eq!(f.service.get_info(UserId(1)).await.unwrap().binding, Some(second));
    }

    #[tokio::test]
    async fn test_recreate_display_delete_failure_keeps_binding() {
        let f = initialized(FakeDisplay {
            delete_error: Some(403),
            ..Default::default()
        })
        .await;

        let first = f.service.recreate_display(UserId(1), ChannelId(5)).await.unwrap();
        let err = f
            .service
            .recreate_display(UserId(1), ChannelId(6))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "display");
        assert_eq!(f.service.get_info(UserId(1)).await.unwrap().binding, Some(first));
    }

    #[tokio::test]
    async fn test_info_requires_authorization() {
        let f = initialized(FakeDisplay::default()).await;
        let info = f.service.get_info(UserId(1)).await.unwrap();

        assert_eq!(info.mac_address.map(|m| m.to_string()).as_deref(), Some("AA:BB:CC:DD:EE:FF"));
        assert_eq!(info.ip_address, Some("10.0.0.5".parse().unwrap()));
        assert_eq!(info.binding, None);
        assert!(matches!(
            f.service.get_info(UserId(9)).await,
            Err(ServiceError::Forbidden)
        ));
    }
}
