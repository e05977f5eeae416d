//! Authoritative local copy of the application state.
//!
//! The in-memory snapshot is updated synchronously; the durable copy is
//! written as one whole-state blob after a short quiet window so that bursts
//! of mutations cost a single write.

use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::errors::Result;
use crate::state::{recognize, AppState};
use crate::storage::{KeyValueStore, STATE_KEY};
use crate::sync::scheduler::LOCAL_SAVE_DEBOUNCE_MS;
use crate::sync::{Clock, DebounceTarget, Debouncer, Destination, RateGate};

/// What was found under [`STATE_KEY`] at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredShape {
    Missing,
    Malformed,
    /// Readable, but written with legacy collection keys.
    Legacy,
    Canonical,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedState {
    pub state: AppState,
    pub shape: StoredShape,
}

/// Read the stored blob. Never fails: anything unreadable yields defaults.
pub fn load_state(store: &dyn KeyValueStore) -> LoadedState {
    let raw = match store.get(STATE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return LoadedState::missing(),
        Err(e) => {
            warn!("[LocalCache] Failed to read stored state: {}", e);
            return LoadedState::missing();
        }
    };

    let value: Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!("[LocalCache] Stored state is not valid JSON, using defaults: {}", e);
            return LoadedState::malformed();
        }
    };
    if !value.is_object() {
        warn!("[LocalCache] Stored state is not a JSON object, using defaults");
        return LoadedState::malformed();
    }

    let recognized = recognize(&value);
    let shape = if recognized.legacy_aliases.is_empty() {
        StoredShape::Canonical
    } else {
        StoredShape::Legacy
    };
    LoadedState {
        state: recognized.state,
        shape,
    }
}

/// Write the whole snapshot with canonical keys.
pub fn persist_state(store: &dyn KeyValueStore, state: &AppState) -> Result<()> {
    let raw = serde_json::to_string(state)?;
    store.set(STATE_KEY, &raw)
}

impl LoadedState {
    fn missing() -> Self {
        Self {
            state: AppState::default(),
            shape: StoredShape::Missing,
        }
    }

    fn malformed() -> Self {
        Self {
            state: AppState::default(),
            shape: StoredShape::Malformed,
        }
    }
}

struct StatePersister {
    store: Arc<dyn KeyValueStore>,
    gate: RateGate,
}

#[async_trait]
impl DebounceTarget<AppState> for StatePersister {
    async fn fire(&self, state: AppState) {
        match persist_state(self.store.as_ref(), &state) {
            Ok(()) => {
                if let Err(e) = self.gate.record_success(Destination::Local) {
                    warn!("[LocalCache] Failed to record save time: {}", e);
                }
                debug!(
                    "[LocalCache] Persisted state ({} records)",
                    state.total_records()
                );
            }
            Err(e) => error!("[LocalCache] Failed to persist state: {}", e),
        }
    }
}

pub struct LocalStateCache {
    state: RwLock<AppState>,
    store: Arc<dyn KeyValueStore>,
    gate: RateGate,
    shape: StoredShape,
    persister: Debouncer<AppState>,
}

impl LocalStateCache {
    /// Load the cache from `store`. Must be called inside a tokio runtime.
    pub fn load(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self::load_with_window(
            store,
            clock,
            Duration::from_millis(LOCAL_SAVE_DEBOUNCE_MS),
        )
    }

    pub fn load_with_window(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        window: Duration,
    ) -> Self {
        let loaded = load_state(store.as_ref());
        if loaded.shape == StoredShape::Legacy {
            info!("[LocalCache] Rewriting stored state with canonical keys");
            if let Err(e) = persist_state(store.as_ref(), &loaded.state) {
                warn!("[LocalCache] Failed to rewrite legacy state: {}", e);
            }
        }

        // The local gate only tracks the save time; it never throttles.
        let gate = RateGate::new(store.clone(), clock, 0);
        let persister = Debouncer::start(
            "local-save",
            window,
            Arc::new(StatePersister {
                store: store.clone(),
                gate: gate.clone(),
            }),
        );

        Self {
            state: RwLock::new(loaded.state),
            store,
            gate,
            shape: loaded.shape,
            persister,
        }
    }

    pub fn get_state(&self) -> AppState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the snapshot and schedule a durable write.
    pub fn set_state(&self, state: AppState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state.clone();
        self.persister.schedule(state);
    }

    /// Apply `mutate` to the current snapshot and return the result.
    pub fn update<F>(&self, mutate: F) -> AppState
    where
        F: FnOnce(&mut AppState),
    {
        let next = {
            let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
            mutate(&mut *guard);
            guard.clone()
        };
        self.persister.schedule(next.clone());
        next
    }

    /// Whether a readable snapshot was found at load time.
    pub fn has_stored_state(&self) -> bool {
        matches!(self.shape, StoredShape::Canonical | StoredShape::Legacy)
    }

    pub fn stored_shape(&self) -> StoredShape {
        self.shape
    }

    /// Epoch millis of the last completed durable write.
    pub fn last_saved_at(&self) -> Option<i64> {
        self.gate.last_success(Destination::Local)
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Write any pending snapshot now.
    pub async fn flush(&self) {
        self.persister.flush().await;
    }

    /// Drop pending writes, delete the stored snapshot and reset to defaults.
    pub async fn clear(&self) -> Result<()> {
        self.persister.cancel();
        // Wait until a write already in progress has finished.
        self.persister.flush().await;
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = AppState::default();
        self.store.remove(STATE_KEY)?;
        self.gate.reset(Destination::Local)?;
        info!("[LocalCache] Cleared local state");
        Ok(())
    }
}
