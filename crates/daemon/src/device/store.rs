//! Persistent device record storage.
//!
//! The store keeps one JSON file (`<data_dir>/data.json`). Every access goes
//! through a single async mutex so that a load, a mutation and the save that
//! follows it are never interleaved with another writer. There is no
//! field-level update API: callers always write the whole record back.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

use super::record::DeviceRecord;

/// File name of the device record inside the data directory.
pub const DEVICE_RECORD_FILE: &str = "data.json";

/// Errors raised while reading or writing the device record.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access device record {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse device record {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize device record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Mutex-guarded store for the single device record.
pub struct DeviceStore {
    /// The path to the JSON file.
    path: PathBuf,
    /// Serializes every load-modify-save sequence.
    lock: Mutex<()>,
}

impl DeviceStore {
    /// Creates a store that persists to the given path.
    ///
    /// Nothing is read until the first access.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    /// Creates a store inside the given data directory.
    pub fn in_data_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        Self::new(data_dir.as_ref().join(DEVICE_RECORD_FILE))
    }

    /// Returns the path to the record file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads a fresh copy of the record.
    ///
    /// If no record has been persisted yet, the empty default is written
    /// to disk and returned.
    pub async fn load(&self) -> Result<DeviceRecord, StoreError> {
        let _guard = self.lock.lock().await;
        self.load_unlocked()
    }

    /// Writes the full record.
    pub async fn save(&self, record: &DeviceRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.save_unlocked(record)
    }

    /// Opens a transaction holding the store lock.
    ///
    /// The lock is held until the transaction is committed or dropped, so
    /// external calls made in between (e.g. posting a display) are covered
    /// too. Dropping without `commit` leaves the file untouched.
    pub async fn begin(&self) -> Result<Transaction<'_>, StoreError> {
        let guard = self.lock.lock().await;
        let record = self.load_unlocked()?;
        Ok(Transaction {
            store: self,
            _guard: guard,
            record,
        })
    }

    /// Loads, applies `mutate`, and saves, all under one lock acquisition.
    ///
    /// If `mutate` fails, nothing is written and its error is returned.
    pub async fn transact<T, E, F>(&self, mutate: F) -> Result<T, E>
    where
        F: FnOnce(&mut DeviceRecord) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut tx = self.begin().await?;
        let value = mutate(tx.record_mut())?;
        tx.commit()?;
        Ok(value)
    }

    fn load_unlocked(&self) -> Result<DeviceRecord, StoreError> {
        if !self.path.exists() {
            tracing::debug!(
                "Device record not found at {:?}, writing empty default",
                self.path
            );
            let record = DeviceRecord::default();
            self.save_unlocked(&record)?;
            return Ok(record);
        }

        let contents = fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Atomic write: temp file, then rename over the target.
    fn save_unlocked(&self, record: &DeviceRecord) -> Result<(), StoreError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| StoreError::Io { path, source }
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }

        let contents = to_pretty_json(record)?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, contents).map_err(io_err(&temp_path))?;
        fs::rename(&temp_path, &self.path).map_err(io_err(&self.path))?;

        tracing::debug!("Saved device record to {:?}", self.path);
        Ok(())
    }
}

/// Serializes with 4-space indentation, the layout the record file has
/// always used.
fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    Ok(buf)
}

/// A locked, loaded record awaiting commit.
pub struct Transaction<'a> {
    store: &'a DeviceStore,
    _guard: MutexGuard<'a, ()>,
    record: DeviceRecord,
}

impl Transaction<'_> {
    /// The record as loaded (plus any changes made so far).
    pub fn record(&self) -> &DeviceRecord {
        &self.record
    }

    /// Mutable access to the pending record.
    pub fn record_mut(&mut self) -> &mut DeviceRecord {
        &mut self.record
    }

    /// Saves the full record and releases the lock.
    pub fn commit(self) -> Result<(), StoreError> {
        self.store.save_unlocked(&self.record)
    }
}

/// Returns the default data directory.
///
/// The default is `~/.local/share/pcwake`.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pcwake")
}
