use std::sync::Arc;

use axum::middleware;
use axum::Router;
use tracing::{info, warn};

use crate::api;
use crate::config::GatewayConfig;
use crate::cors::cors;
use crate::error::{ApiError, ApiResult};
use crate::store::{GitHubStore, MemoryStore, StoreResult, VersionedStore};

pub struct GatewayState {
    pub config: GatewayConfig,
    /// `None` when no backing store is configured; writes and reads then fail with 500.
    store: Option<Arc<dyn VersionedStore>>,
}

impl GatewayState {
    pub fn new(config: GatewayConfig, store: Option<Arc<dyn VersionedStore>>) -> Self {
        Self { config, store }
    }

    pub fn store(&self) -> ApiResult<&dyn VersionedStore> {
        self.store.as_deref().ok_or(ApiError::NotConfigured)
    }
}

/// Pick the backing store the configuration asks for.
pub fn build_state(config: GatewayConfig) -> StoreResult<Arc<GatewayState>> {
    let store: Option<Arc<dyn VersionedStore>> = if config.memory_store {
        info!("[Gateway] Using in-memory store");
        Some(Arc::new(MemoryStore::new()))
    } else {
        let repository = &config.repository;
        match (&repository.owner, &repository.repo, &repository.token) {
            (Some(owner), Some(repo), Some(token)) => {
                info!(
                    "[Gateway] Using repository {}/{} on branch {}",
                    owner, repo, repository.branch
                );
                Some(Arc::new(GitHubStore::new(
                    &repository.api_url,
                    owner,
                    repo,
                    token,
                    &repository.branch,
                    config.request_timeout,
                )?))
            }
            _ => {
                warn!("[Gateway] Repository owner, name or token missing; store requests will fail");
                None
            }
        }
    };

    Ok(Arc::new(GatewayState::new(config, store)))
}

pub fn app_router(state: Arc<GatewayState>) -> Router {
    api::router()
        .fallback(api::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), cors))
        .with_state(state)
}
