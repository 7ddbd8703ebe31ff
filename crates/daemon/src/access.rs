//! Authorization checks run before every sensitive operation.

use protocol::UserId;

use crate::device::DeviceRecord;
use crate::error::{ServiceError, ServiceResult};

/// True once MAC, IP and password have been set.
pub fn is_initialized(record: &DeviceRecord) -> bool {
    record.target().is_some()
}

/// True if the user is on the authorization list.
pub fn is_authorized(record: &DeviceRecord, user: UserId) -> bool {
    record.is_authorized(user)
}

/// Gate for add/remove user, display recreation and power-on.
///
/// Initialization is checked first so an unconfigured device tells the
/// caller what to do rather than just refusing.
pub fn ensure_ready(record: &DeviceRecord, user: UserId) -> ServiceResult<()> {
    if !is_initialized(record) {
        return Err(ServiceError::NotInitialized);
    }
    if !is_authorized(record, user) {
        tracing::debug!(%user, "Refused: not authorized");
        return Err(ServiceError::Forbidden);
    }
    Ok(())
}

/// Gate for `init`.
///
/// While nobody is authorized anyone may claim the device; afterwards only
/// an authorized user may re-provision it.
pub fn ensure_may_initialize(record: &DeviceRecord, user: UserId) -> ServiceResult<()> {
    if record.authorized_users().is_empty() || is_authorized(record, user) {
        Ok(())
    } else {
        tracing::debug!(%user, "Refused re-initialization: not authorized");
        Err(ServiceError::Forbidden)
    }
}

/// Gate for `info`: authorization only.
pub fn ensure_may_view(record: &DeviceRecord, user: UserId) -> ServiceResult<()> {
    if is_authorized(record, user) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden)
    }
}
