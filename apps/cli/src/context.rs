use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use linkhub_core::settings::load_settings;
use linkhub_core::sync::{Clock, SystemClock};
use linkhub_core::{KeyValueStore, LocalStateCache};
use linkhub_remote_sync::{LogNotifier, SyncClient, SyncClientConfig, SyncService};
use linkhub_storage_sqlite::{Database, KeyValueRepository};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub db_path: PathBuf,
    /// Overrides the endpoint saved in settings.
    pub endpoint: Option<String>,
    pub origin: Option<String>,
    pub timeout: Duration,
}

/// Application root: owns the store, the cache and the sync service.
pub struct ServiceContext {
    pub db_path: PathBuf,
    pub store: Arc<dyn KeyValueStore>,
    pub cache: Arc<LocalStateCache>,
    pub client: Arc<SyncClient>,
    pub sync_service: Arc<SyncService>,
}

/// Build the context. Must run inside the tokio runtime.
pub fn initialize_context(config: &ContextConfig) -> anyhow::Result<ServiceContext> {
    let db = Database::open(&config.db_path)?;
    let store: Arc<dyn KeyValueStore> = Arc::new(KeyValueRepository::new(db));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let settings = load_settings(store.as_ref());
    let endpoint = config
        .endpoint
        .clone()
        .filter(|endpoint| !endpoint.trim().is_empty())
        .or(settings.endpoint);
    debug!(
        "Opening {} (endpoint: {})",
        config.db_path.display(),
        endpoint.as_deref().unwrap_or("<none>")
    );

    let cache = Arc::new(LocalStateCache::load(store.clone(), clock.clone()));
    let client = Arc::new(SyncClient::new(
        SyncClientConfig {
            endpoint,
            timeout: config.timeout,
            origin: config.origin.clone(),
            ..SyncClientConfig::default()
        },
        store.clone(),
        clock,
    )?);
    let sync_service = Arc::new(SyncService::new(
        cache.clone(),
        client.clone(),
        Arc::new(LogNotifier),
    ));

    Ok(ServiceContext {
        db_path: config.db_path.clone(),
        store,
        cache,
        client,
        sync_service,
    })
}
