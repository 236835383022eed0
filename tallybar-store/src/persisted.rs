//! Key-value backed state container.
//!
//! A [`PersistedStore`] holds an in-memory state `S` that is mirrored, field
//! by field, into one key of a [`KeyValueStore`]. The lifecycle is:
//!
//! 1. Construction is synchronous. The state starts from its defaults and
//!    `ready` is false.
//! 2. Hydration is spawned immediately. It loads the persisted object,
//!    applies the store's persisted fields, and sets `ready` (also when the
//!    load fails; the defaults stay in place).
//! 3. Mutations update memory, then persist the touched fields by merging
//!    them over a freshly read copy of the persisted object.
//! 4. Writes to the key from anywhere else (another store bound to the same
//!    backend) are reapplied to memory.
//!
//! Only the listed fields are ever written, so transient state (loading
//! flags and the like) never reaches storage.
//!
//! Fields written locally before hydration finishes are skipped by
//! hydration. When reapplying a change, fields with a persist in flight and
//! fields this store has since written at a later revision are skipped, so
//! memory never rolls back to an older value.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::StoreError;
use crate::kv::{KeyWatch, SharedKeyValueStore, WatchEvent};

/// Bounds required of a store state.
pub trait StoreState: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T: Serialize + DeserializeOwned + Send + Sync + 'static> StoreState for T {}

// ============================================================================
// Subscription
// ============================================================================

/// Handle of an [`PersistedStore::on_change`] callback. Dropping it
/// unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Stops the callback.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ============================================================================
// Shared State
// ============================================================================

struct Shared<S> {
    key: &'static str,
    fields: &'static [&'static str],
    kv: SharedKeyValueStore,
    state: RwLock<S>,
    /// Fields written before hydration completed.
    touched: Mutex<HashSet<&'static str>>,
    /// Fields with a persist in flight, with their count.
    pending: Mutex<HashMap<&'static str, usize>>,
    /// Revision of this store's latest write of each field.
    written: Mutex<HashMap<&'static str, u64>>,
    ready: watch::Sender<bool>,
    version: watch::Sender<u64>,
    persist_lock: tokio::sync::Mutex<()>,
    _shutdown: oneshot::Sender<()>,
}

impl<S: StoreState> Shared<S> {
    fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    fn pending_fields(&self) -> HashSet<&'static str> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(field, _)| *field)
            .collect()
    }

    /// Fields not to take from a change at `revision`.
    fn superseded_fields(&self, revision: u64) -> HashSet<&'static str> {
        let mut skip = self.pending_fields();
        skip.extend(
            self.written
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .filter(|(_, written)| **written > revision)
                .map(|(field, _)| *field),
        );
        skip
    }

    fn touched_fields(&self) -> HashSet<&'static str> {
        self.touched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn adjust_pending(&self, fields: &[&'static str], delta: isize) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        for field in fields {
            let count = pending.entry(*field).or_insert(0);
            *count = count.saturating_add_signed(delta);
        }
        pending.retain(|_, count| *count > 0);
    }

    /// Applies the persisted fields of `value`, except `skip`. Returns the
    /// number of fields that changed memory.
    fn apply(&self, value: &Value, skip: &HashSet<&'static str>) -> usize {
        let Value::Object(incoming) = value else {
            warn!(key = self.key, "Ignoring non-object persisted value");
            return 0;
        };

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut current = match serde_json::to_value(&*state) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!(key = self.key, "Store state does not serialize to an object");
                return 0;
            }
        };

        let mut applied = 0;
        for field in self.fields {
            if skip.contains(field) {
                trace!(key = self.key, field, "Skipping locally written field");
                continue;
            }
            let Some(next) = incoming.get(*field) else {
                continue;
            };
            if current.get(*field) == Some(next) {
                continue;
            }

            let previous = current.insert((*field).to_string(), next.clone());
            match serde_json::from_value::<S>(Value::Object(current.clone())) {
                Ok(updated) => {
                    *state = updated;
                    applied += 1;
                }
                Err(e) => {
                    warn!(key = self.key, field, error = %e, "Ignoring invalid persisted field");
                    match previous {
                        Some(previous) => current.insert((*field).to_string(), previous),
                        None => current.remove(*field),
                    };
                }
            }
        }
        drop(state);

        if applied > 0 {
            self.bump();
        }
        applied
    }

    async fn hydrate(&self) {
        match self.kv.get(self.key).await {
            Ok(Some(value)) => {
                let mut skip = self.touched_fields();
                skip.extend(self.pending_fields());
                let applied = self.apply(&value, &skip);
                debug!(key = self.key, applied, "Hydrated store");
            }
            Ok(None) => debug!(key = self.key, "Nothing persisted, using defaults"),
            Err(e) => warn!(key = self.key, error = %e, "Hydration failed, using defaults"),
        }
        self.ready.send_replace(true);
    }

    async fn reapply_latest(&self) {
        match self.kv.get(self.key).await {
            Ok(Some(value)) => {
                self.apply(&value, &self.pending_fields());
            }
            Ok(None) => {}
            Err(e) => warn!(key = self.key, error = %e, "Failed to re-read store after lag"),
        }
    }

    async fn persist(&self, fields: &[&'static str]) -> Result<(), StoreError> {
        let _guard = self.persist_lock.lock().await;

        let partial = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            let Value::Object(mut all) = serde_json::to_value(&*state)? else {
                return Err(StoreError::Corrupt {
                    key: self.key.to_string(),
                    message: "store state is not an object".to_string(),
                });
            };
            fields
                .iter()
                .filter_map(|field| all.remove(*field).map(|v| ((*field).to_string(), v)))
                .collect::<Map<String, Value>>()
        };

        let key = self.key;
        let revision = self
            .kv
            .update(
                key,
                Box::new(move |current| {
                    let mut merged = match current {
                        Some(Value::Object(map)) => map,
                        _ => Map::new(),
                    };
                    merged.extend(partial);
                    Value::Object(merged)
                }),
            )
            .await?;

        let mut written = self.written.lock().unwrap_or_else(PoisonError::into_inner);
        for field in fields {
            written.insert(*field, revision);
        }
        trace!(key, ?fields, revision, "Persisted fields");
        Ok(())
    }
}

async fn run_sync<S: StoreState>(
    shared: Arc<Shared<S>>,
    mut watch: KeyWatch,
    mut shutdown: oneshot::Receiver<()>,
) {
    shared.hydrate().await;
    let weak = Arc::downgrade(&shared);
    drop(shared);

    loop {
        let event = tokio::select! {
            _ = &mut shutdown => break,
            event = watch.next() => event,
        };
        let Some(shared) = weak.upgrade() else {
            break;
        };
        match event {
            Some(WatchEvent::Changed { value, revision }) => {
                shared.apply(&value, &shared.superseded_fields(revision));
            }
            Some(WatchEvent::Lagged) => shared.reapply_latest().await,
            None => break,
        }
    }
}

// ============================================================================
// Persisted Store
// ============================================================================

/// A state container mirrored into one key-value key.
pub struct PersistedStore<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for PersistedStore<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> std::fmt::Debug for PersistedStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedStore")
            .field("key", &self.shared.key)
            .field("fields", &self.shared.fields)
            .field("ready", &*self.shared.ready.borrow())
            .finish_non_exhaustive()
    }
}

impl<S: StoreState> PersistedStore<S> {
    /// Creates a store for `key`, starting from `initial`, and spawns its
    /// hydration.
    ///
    /// Outside a Tokio runtime there is nothing to hydrate on; the store is
    /// ready immediately with `initial`.
    pub fn new(
        kv: SharedKeyValueStore,
        key: &'static str,
        fields: &'static [&'static str],
        initial: S,
    ) -> Self {
        let (ready, _) = watch::channel(false);
        let (version, _) = watch::channel(0);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let watch = kv.watch(key);

        let shared = Arc::new(Shared {
            key,
            fields,
            kv,
            state: RwLock::new(initial),
            touched: Mutex::new(HashSet::new()),
            pending: Mutex::new(HashMap::new()),
            written: Mutex::new(HashMap::new()),
            ready,
            version,
            persist_lock: tokio::sync::Mutex::new(()),
            _shutdown: shutdown_tx,
        });

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(run_sync(Arc::clone(&shared), watch, shutdown_rx));
            }
            Err(_) => {
                warn!(key, "No runtime, store will not hydrate");
                shared.ready.send_replace(true);
            }
        }

        Self { shared }
    }

    /// Storage key.
    pub fn key(&self) -> &'static str {
        self.shared.key
    }

    /// Returns true once hydration has finished.
    pub fn is_ready(&self) -> bool {
        self.shared.is_ready()
    }

    /// Waits for hydration to finish.
    pub async fn wait_ready(&self) {
        let mut rx = self.shared.ready.subscribe();
        // The sender lives as long as `self`.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Waits for hydration at most `timeout`. Returns whether the store is
    /// ready.
    pub async fn wait_ready_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_ready()).await.is_ok()
    }

    /// Reads the state.
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let state = self
            .shared
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Returns a copy of the state.
    pub fn snapshot(&self) -> S
    where
        S: Clone,
    {
        self.read(Clone::clone)
    }

    /// Subscribes to state changes. The value is a change counter.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.version.subscribe()
    }

    /// Calls `callback` whenever `selector`'s value changes.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn on_change<T, F, C>(&self, selector: F, mut callback: C) -> Subscription
    where
        T: PartialEq + Send + 'static,
        F: Fn(&S) -> T + Send + 'static,
        C: FnMut(&T) + Send + 'static,
    {
        let mut rx = self.subscribe();
        let store = self.clone();
        let mut last = store.read(&selector);
        let handle = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let next = store.read(&selector);
                if next != last {
                    callback(&next);
                    last = next;
                }
            }
        });
        Subscription { handle }
    }

    /// Updates memory with `f`, then persists `fields`.
    ///
    /// Memory is updated (and subscribers notified) even if persisting fails.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the write fails.
    pub async fn mutate<R>(
        &self,
        fields: &[&'static str],
        f: impl FnOnce(&mut S) -> R,
    ) -> Result<R, StoreError> {
        let result = {
            let mut state = self
                .shared
                .state
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            f(&mut state)
        };

        if !self.shared.is_ready() {
            self.shared
                .touched
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend(fields.iter().copied());
        }
        self.shared.adjust_pending(fields, 1);
        self.shared.bump();

        let persisted = self.shared.persist(fields).await;
        self.shared.adjust_pending(fields, -1);
        persisted.map(|()| result)
    }

    /// Updates transient (never persisted) state.
    pub fn mutate_transient<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let result = {
            let mut state = self
                .shared
                .state
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            f(&mut state)
        };
        self.shared.bump();
        result
    }
}

// ============================================================================
// Tests
// ============================================================================
