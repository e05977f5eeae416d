//! Application-level sync orchestration.
//!
//! `SyncService` ties the local cache to the gateway client: mutations go to
//! the cache (debounced local save) and, when remote autosave is on, to a
//! second debouncer that pushes the latest snapshot. Explicit and background
//! pushes report through the same [`SyncNotifier`].

use async_trait::async_trait;
use linkhub_core::settings::{load_settings, Settings};
use linkhub_core::sync::scheduler::REMOTE_AUTOSAVE_DEBOUNCE_MS;
use linkhub_core::sync::{DebounceTarget, Debouncer};
use linkhub_core::{AppState, LocalStateCache};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::client::SyncClient;
use crate::error::{RemoteSyncError, Result};
use crate::types::{PullOutcome, PullReport, PullSource, PushResponse, SyncResult};

/// User-visible sync events.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Pushed {
        written: usize,
        background: bool,
    },
    /// The push succeeded overall but some files were not written.
    PartialWriteFailure {
        failed: Vec<SyncResult>,
        background: bool,
    },
    PushFailed {
        error: String,
        background: bool,
    },
    RateLimited {
        retry_in_ms: i64,
        background: bool,
    },
    Loaded {
        source: PullSource,
        records: usize,
        degraded: bool,
    },
    /// The remote returned nothing; local data was kept.
    EmptyRemote {
        kept_local_records: usize,
    },
    LoadFailed {
        error: String,
    },
}

pub trait SyncNotifier: Send + Sync {
    fn notify(&self, event: SyncEvent);
}

/// Notifier that only logs.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl SyncNotifier for LogNotifier {
    fn notify(&self, event: SyncEvent) {
        match &event {
            SyncEvent::PushFailed { .. } | SyncEvent::LoadFailed { .. } => {
                error!("[SyncService] {:?}", event)
            }
            SyncEvent::PartialWriteFailure { .. }
            | SyncEvent::RateLimited { .. }
            | SyncEvent::EmptyRemote { .. } => warn!("[SyncService] {:?}", event),
            _ => info!("[SyncService] {:?}", event),
        }
    }
}

struct Pusher {
    client: Arc<SyncClient>,
    notifier: Arc<dyn SyncNotifier>,
}

impl Pusher {
    async fn push(&self, state: &AppState, background: bool) -> Result<PushResponse> {
        let result = self.client.push(state).await;
        let event = match &result {
            Ok(response) => {
                let failed: Vec<SyncResult> =
                    response.failed_results().into_iter().cloned().collect();
                if failed.is_empty() {
                    SyncEvent::Pushed {
                        written: response.results.len(),
                        background,
                    }
                } else {
                    SyncEvent::PartialWriteFailure { failed, background }
                }
            }
            Err(RemoteSyncError::RateLimited { retry_in_ms }) => SyncEvent::RateLimited {
                retry_in_ms: *retry_in_ms,
                background,
            },
            Err(e) => SyncEvent::PushFailed {
                error: e.to_string(),
                background,
            },
        };
        self.notifier.notify(event);
        result
    }
}

#[async_trait]
impl DebounceTarget<AppState> for Pusher {
    async fn fire(&self, state: AppState) {
        // Failures were already reported through the notifier.
        let _ = self.push(&state, true).await;
    }
}

pub struct SyncService {
    cache: Arc<LocalStateCache>,
    client: Arc<SyncClient>,
    notifier: Arc<dyn SyncNotifier>,
    pusher: Arc<Pusher>,
    autosave: Debouncer<AppState>,
    settings: Settings,
}

impl SyncService {
    /// Build the service. Must be called inside a tokio runtime.
    pub fn new(
        cache: Arc<LocalStateCache>,
        client: Arc<SyncClient>,
        notifier: Arc<dyn SyncNotifier>,
    ) -> Self {
        Self::with_autosave_window(
            cache,
            client,
            notifier,
            Duration::from_millis(REMOTE_AUTOSAVE_DEBOUNCE_MS),
        )
    }

    pub fn with_autosave_window(
        cache: Arc<LocalStateCache>,
        client: Arc<SyncClient>,
        notifier: Arc<dyn SyncNotifier>,
        window: Duration,
    ) -> Self {
        let settings = load_settings(cache.store().as_ref());
        let pusher = Arc::new(Pusher {
            client: client.clone(),
            notifier: notifier.clone(),
        });
        let autosave = Debouncer::start("remote-autosave", window, pusher.clone());
        Self {
            cache,
            client,
            notifier,
            pusher,
            autosave,
            settings,
        }
    }

    pub fn cache(&self) -> &Arc<LocalStateCache> {
        &self.cache
    }

    pub fn client(&self) -> &Arc<SyncClient> {
        &self.client
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> AppState {
        self.cache.get_state()
    }

    /// Apply a mutation: saved locally, and pushed later when autosave is on.
    pub fn update<F>(&self, mutate: F) -> AppState
    where
        F: FnOnce(&mut AppState),
    {
        let next = self.cache.update(mutate);
        self.schedule_autosave(&next);
        next
    }

    pub fn replace_state(&self, state: AppState) {
        self.cache.set_state(state.clone());
        self.schedule_autosave(&state);
    }

    fn schedule_autosave(&self, state: &AppState) {
        if self.settings.remote_autosave {
            self.autosave.schedule(state.clone());
        }
    }

    /// Push the current state now, dropping any pending autosave.
    pub async fn save_now(&self) -> Result<PushResponse> {
        self.autosave.cancel();
        self.pusher.push(&self.cache.get_state(), false).await
    }

    /// Pull and replace local state.
    ///
    /// An empty remote only replaces local data when local is empty too or
    /// `force` is set.
    pub async fn load_from_remote(&self, force: bool) -> Result<PullReport> {
        let report = match self.client.load().await {
            Ok(report) => report,
            Err(e) => {
                self.notifier.notify(SyncEvent::LoadFailed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        match &report.outcome {
            PullOutcome::Loaded { source, .. } => {
                // Collections the remote could not serve keep their local records.
                let mut next = report.outcome.state().clone();
                if !report.degraded.is_empty() {
                    let local = self.cache.get_state();
                    for degraded in &report.degraded {
                        next.set_collection(
                            degraded.collection,
                            local.collection(degraded.collection).to_vec(),
                        );
                    }
                    warn!(
                        "[SyncService] Kept local records for {} unreadable collections",
                        report.degraded.len()
                    );
                }
                self.autosave.cancel();
                let records = next.total_records();
                self.cache.set_state(next);
                self.notifier.notify(SyncEvent::Loaded {
                    source: *source,
                    records,
                    degraded: report.is_degraded(),
                });
            }
            PullOutcome::EmptyRemote { .. } => {
                let local = self.cache.get_state();
                if force || local.is_empty() {
                    self.autosave.cancel();
                    self.cache.set_state(report.outcome.state().clone());
                }
                self.notifier.notify(SyncEvent::EmptyRemote {
                    kept_local_records: if force { 0 } else { local.total_records() },
                });
            }
        }
        Ok(report)
    }

    /// Pull at startup when nothing is stored locally, or when forced.
    pub async fn autoload(&self, force: bool) -> Result<Option<PullReport>> {
        if self.cache.has_stored_state() && !force {
            return Ok(None);
        }
        info!("[SyncService] Loading state from the remote at startup");
        self.load_from_remote(false).await.map(Some)
    }

    /// Drop pending pushes and delete local data.
    pub async fn clear_local(&self) -> Result<()> {
        self.autosave.cancel();
        self.cache.clear().await?;
        Ok(())
    }

    /// Run pending autosave and local writes now.
    pub async fn flush(&self) {
        self.autosave.flush().await;
        self.cache.flush().await;
    }
}
