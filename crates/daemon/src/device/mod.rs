//! Device record management.
//!
//! This module provides the persisted record describing the single wake
//! target, its authorized users and the status display binding, together
//! with the mutex-guarded store that reads and writes it.

pub mod record;
pub mod store;

pub use record::{DeviceRecord, DisplayBinding, Provisioning, WakeTarget};
pub use store::{default_data_dir, DeviceStore, StoreError, Transaction, DEVICE_RECORD_FILE};
