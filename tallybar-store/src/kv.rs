//! Key-value storage backends.
//!
//! Stores persist through the narrow [`KeyValueStore`] interface: read a key,
//! write a key, atomically read-modify-write a key, and watch a key for
//! changes. Two backends are provided:
//!
//! - [`MemoryKeyValueStore`] - session scope, lost when the process exits
//! - [`FileKeyValueStore`] - durable scope, one JSON file per key
//!
//! Every write is published to watchers of the same backend instance, so
//! several stores bound to one key stay consistent without sharing memory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::persistence::{read_json, write_json};

/// Capacity of the change broadcast channel.
const CHANGE_CAPACITY: usize = 256;

// ============================================================================
// Change Events
// ============================================================================

/// A write observed on a key-value backend.
#[derive(Debug, Clone, PartialEq)]
pub struct KvChange {
    /// Key that was written.
    pub key: String,
    /// New value.
    pub value: Value,
    /// Backend-wide write counter, increasing with every write.
    pub revision: u64,
}

/// What a [`KeyWatch`] yields.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// The key was written.
    Changed {
        /// New value.
        value: Value,
        /// Revision of the write.
        revision: u64,
    },
    /// Some changes were dropped; re-read the key.
    Lagged,
}

/// A subscription to one key. Dropping it unsubscribes.
#[derive(Debug)]
pub struct KeyWatch {
    key: String,
    rx: broadcast::Receiver<KvChange>,
}

impl KeyWatch {
    fn new(key: &str, rx: broadcast::Receiver<KvChange>) -> Self {
        Self {
            key: key.to_string(),
            rx,
        }
    }

    /// The watched key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Waits for the next change of the watched key.
    ///
    /// Returns `None` once the backend is gone.
    pub async fn next(&mut self) -> Option<WatchEvent> {
        loop {
            match self.rx.recv().await {
                Ok(change) if change.key == self.key => {
                    return Some(WatchEvent::Changed {
                        value: change.value,
                        revision: change.revision,
                    });
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(key = %self.key, skipped, "Key watcher lagged");
                    return Some(WatchEvent::Lagged);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

// ============================================================================
// Key-Value Store Trait
// ============================================================================

/// Read-modify-write step passed to [`KeyValueStore::update`].
pub type UpdateFn = Box<dyn FnOnce(Option<Value>) -> Value + Send>;

/// Persisted key-value storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a key. Missing keys read as `None`.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Writes a key and notifies its watchers.
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Atomically replaces a key with `f(current)` and returns the write's
    /// revision.
    ///
    /// No other `set` or `update` on the same backend interleaves between the
    /// read and the write.
    async fn update(&self, key: &str, f: UpdateFn) -> Result<u64, StoreError>;

    /// Watches a key for writes made after this call.
    fn watch(&self, key: &str) -> KeyWatch;
}

fn check_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !key.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

// ============================================================================
// Memory Backend
// ============================================================================

/// Session-scoped backend.
#[derive(Debug)]
pub struct MemoryKeyValueStore {
    values: RwLock<HashMap<String, Value>>,
    write_lock: Mutex<()>,
    revision: AtomicU64,
    changes: broadcast::Sender<KvChange>,
}

impl Default for MemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKeyValueStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            values: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
            revision: AtomicU64::new(0),
            changes,
        }
    }

    fn read(&self, key: &str) -> Option<Value> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn write(&self, key: &str, value: Value) -> u64 {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.clone());
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        // No receivers is fine.
        let _ = self.changes.send(KvChange {
            key: key.to_string(),
            value,
            revision,
        });
        revision
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        check_key(key)?;
        Ok(self.read(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        check_key(key)?;
        let _guard = self.write_lock.lock().await;
        self.write(key, value);
        Ok(())
    }

    async fn update(&self, key: &str, f: UpdateFn) -> Result<u64, StoreError> {
        check_key(key)?;
        let _guard = self.write_lock.lock().await;
        let next = f(self.read(key));
        Ok(self.write(key, next))
    }

    fn watch(&self, key: &str) -> KeyWatch {
        KeyWatch::new(key, self.changes.subscribe())
    }
}

// ============================================================================
// File Backend
// ============================================================================

/// Durable backend storing each key as `<dir>/<key>.json`.
#[derive(Debug)]
pub struct FileKeyValueStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
    revision: AtomicU64,
    changes: broadcast::Sender<KvChange>,
}

impl FileKeyValueStore {
    /// Creates a store rooted at `dir`. The directory is created on first
    /// write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
            revision: AtomicU64::new(0),
            changes,
        }
    }

    /// Creates a store in the default data directory.
    pub fn open_default() -> Self {
        Self::new(crate::persistence::default_data_dir())
    }

    /// The root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> Result<PathBuf, StoreError> {
        check_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }

    async fn write(&self, key: &str, path: &Path, value: Value) -> Result<u64, StoreError> {
        write_json(path, &value).await?;
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(key, revision, "Persisted value");
        let _ = self.changes.send(KvChange {
            key: key.to_string(),
            value,
            revision,
        });
        Ok(revision)
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        read_json(&self.path(key)?).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let path = self.path(key)?;
        let _guard = self.write_lock.lock().await;
        self.write(key, &path, value).await.map(|_| ())
    }

    async fn update(&self, key: &str, f: UpdateFn) -> Result<u64, StoreError> {
        let path = self.path(key)?;
        let _guard = self.write_lock.lock().await;
        let next = f(read_json(&path).await?);
        self.write(key, &path, next).await
    }

    fn watch(&self, key: &str) -> KeyWatch {
        KeyWatch::new(key, self.changes.subscribe())
    }
}

/// A shared backend handle.
pub type SharedKeyValueStore = Arc<dyn KeyValueStore>;

// ============================================================================
// Tests
// ============================================================================
