//! HTTP client for the LinkHub sync gateway.
//!
//! Push sends the whole state in one request and never retries. Pull tries
//! the combined `?op=load` read first and falls back to one GET per
//! collection resource when that yields nothing recognizable.

use futures::future::join_all;
use linkhub_core::state::schema::{extract_collection, parse_resource_document};
use linkhub_core::state::recognize;
use linkhub_core::sync::scheduler::{DEFAULT_REQUEST_TIMEOUT_SECS, MIN_REMOTE_PUSH_INTERVAL_MS};
use linkhub_core::sync::{Clock, Destination, GateDecision, RateGate};
use linkhub_core::{AppState, Collection, KeyValueStore, Record};
use log::{debug, info, warn};
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN};
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::endpoint::Endpoint;
use crate::error::{RemoteSyncError, Result};
use crate::types::*;

const MAX_LOG_BODY_CHARS: usize = 512;

#[derive(Debug, Clone)]
pub struct SyncClientConfig {
    /// Raw endpoint; validated on every call so a bad value fails locally.
    pub endpoint: Option<String>,
    pub timeout: Duration,
    pub min_push_interval_ms: i64,
    /// Sent as `Origin` on every request; gateways only accept writes from
    /// allow-listed origins.
    pub origin: Option<String>,
}

impl Default for SyncClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            min_push_interval_ms: MIN_REMOTE_PUSH_INTERVAL_MS,
            origin: None,
        }
    }
}

impl SyncClientConfig {
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }
}

/// Client for the sync gateway.
///
/// Holds no lock across calls: concurrent pushes may race, the rate gate is
/// the only guard.
#[derive(Clone)]
pub struct SyncClient {
    client: reqwest::Client,
    endpoint: Option<String>,
    gate: RateGate,
}

impl SyncClient {
    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("[SyncClient] Response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("[SyncClient] Response error ({}): {}", status, preview);
    }

    /// Create a client. Push timestamps are kept in `store`.
    pub fn new(
        config: SyncClientConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(origin) = config.origin.as_deref().map(str::trim).filter(|o| !o.is_empty()) {
            let value = HeaderValue::from_str(origin)
                .map_err(|_| RemoteSyncError::config(format!("Invalid origin '{}'", origin)))?;
            headers.insert(ORIGIN, value);
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint,
            gate: RateGate::new(store, clock, config.min_push_interval_ms),
        })
    }

    pub fn endpoint(&self) -> Result<Endpoint> {
        Endpoint::parse(self.endpoint.as_deref().unwrap_or_default())
    }

    /// Epoch millis of the last successful push.
    pub fn last_pushed_at(&self) -> Option<i64> {
        self.gate.last_success(Destination::Remote)
    }

    /// Parse a JSON response body, turning non-2xx statuses into API errors.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(RemoteSyncError::api(status.as_u16(), error.error));
            }
            let message = body.trim();
            let message = if message.is_empty() {
                status.canonical_reason().unwrap_or("request failed")
            } else {
                message
            };
            return Err(RemoteSyncError::api(status.as_u16(), message));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!("[SyncClient] Failed to deserialize response: {}", e);
            RemoteSyncError::api(status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    async fn get_json(&self, url: Url) -> Result<Value> {
        let response = self.client.get(url).send().await?;
        Self::parse_response(response).await
    }

    /// Push the whole state.
    ///
    /// Fails locally, without a request, on a bad endpoint or when the last
    /// successful push is more recent than the minimum interval.
    ///
    /// POST <endpoint>
    pub async fn push(&self, state: &AppState) -> Result<PushResponse> {
        let endpoint = self.endpoint()?;
        if let GateDecision::TooSoon { retry_in_ms } = self.gate.check(Destination::Remote) {
            return Err(RemoteSyncError::RateLimited { retry_in_ms });
        }

        debug!(
            "[SyncClient] Pushing {} records to {}",
            state.total_records(),
            endpoint
        );
        let response = self
            .client
            .post(endpoint.base_url())
            .json(state)
            .send()
            .await?;
        let body: PushResponse = Self::parse_response(response).await?;

        if let Err(e) = self.gate.record_success(Destination::Remote) {
            warn!("[SyncClient] Failed to record push time: {}", e);
        }
        info!(
            "[SyncClient] Push accepted: {}/{} files written",
            body.results.len() - body.failed_results().len(),
            body.results.len()
        );
        Ok(body)
    }

    /// Pull the remote state.
    ///
    /// Only a bad endpoint is an error. Transport and HTTP failures degrade
    /// the affected read and are reported in the returned [`PullReport`].
    ///
    /// GET <endpoint>?op=load, then GET <endpoint>/data/<file> per collection
    pub async fn load(&self) -> Result<PullReport> {
        let endpoint = self.endpoint()?;
        let mut stages = vec![PullStage::CombinedTried];
        let mut combined_error = None;
        let mut diagnostics = None;

        match self.get_json(endpoint.combined_url()).await {
            Ok(value) => {
                let recognized = recognize(&value);
                if recognized.is_recognized() {
                    stages.push(PullStage::CombinedRecognized);
                    if !recognized.legacy_aliases.is_empty() {
                        debug!(
                            "[SyncClient] Combined response used legacy keys for {:?}",
                            recognized.legacy_aliases
                        );
                    }
                    return Ok(Self::finish(
                        recognized.state,
                        PullSource::Combined,
                        stages,
                        None,
                        None,
                        Vec::new(),
                    ));
                }
                if value.is_object() {
                    diagnostics = Some(value);
                }
            }
            Err(e) => combined_error = Some(e.to_string()),
        }
        stages.push(PullStage::CombinedUnrecognizedOrFailed);

        stages.push(PullStage::FallbackTried);
        let fetches = Collection::ALL.into_iter().map(|collection| {
            let url = endpoint.resource_url(collection);
            async move { (collection, self.get_json(url).await) }
        });
        let documents = join_all(fetches).await;

        // Older repositories keep sections inside the links document.
        let embedded_sections = documents.iter().find_map(|(collection, result)| match result {
            Ok(value) if *collection == Collection::Links => {
                extract_collection(value, Collection::Sections)
            }
            _ => None,
        });

        let mut state = AppState::default();
        let mut degraded = Vec::new();
        for (collection, result) in documents {
            match result.and_then(|value| Self::resource_records(&value, collection)) {
                Ok(records) => state.set_collection(collection, records),
                Err(e) => match (&embedded_sections, collection) {
                    (Some(sections), Collection::Sections) => {
                        debug!(
                            "[SyncClient] Sections resource unavailable ({}), using the links document",
                            e
                        );
                        state.set_collection(collection, sections.clone());
                    }
                    _ => degraded.push(DegradedCollection {
                        collection,
                        error: e.to_string(),
                    }),
                },
            }
        }

        let report = Self::finish(
            state,
            PullSource::Fallback,
            stages,
            combined_error,
            diagnostics,
            degraded,
        );
        if report.is_degraded() {
            warn!(
                "[SyncClient] Degraded pull from {}: combined read {}, {} of {} resources unavailable",
                endpoint,
                report.combined_error.as_deref().unwrap_or("unrecognized"),
                report.degraded.len(),
                Collection::ALL.len()
            );
        }
        Ok(report)
    }

    fn resource_records(value: &Value, collection: Collection) -> Result<Vec<Record>> {
        parse_resource_document(value, collection).ok_or_else(|| {
            RemoteSyncError::api(200, format!("resource holds no {} array", collection))
        })
    }

    fn finish(
        state: AppState,
        source: PullSource,
        mut stages: Vec<PullStage>,
        combined_error: Option<String>,
        diagnostics: Option<Value>,
        degraded: Vec<DegradedCollection>,
    ) -> PullReport {
        let outcome = if state.is_empty() {
            if source == PullSource::Fallback {
                stages.push(PullStage::FallbackAllEmpty);
            }
            stages.push(PullStage::DoneEmpty);
            PullOutcome::EmptyRemote { state }
        } else {
            if source == PullSource::Fallback {
                stages.push(PullStage::FallbackNonEmpty);
            }
            stages.push(PullStage::Done);
            PullOutcome::Loaded { state, source }
        };
        PullReport {
            outcome,
            stages,
            combined_error,
            diagnostics,
            degraded,
        }
    }

    /// Fetch gateway diagnostics.
    ///
    /// GET <endpoint>
    pub async fn diagnostics(&self) -> Result<DiagnosticsResponse> {
        let endpoint = self.endpoint()?;
        let response = self.client.get(endpoint.base_url()).send().await?;
        Self::parse_response(response).await
    }
}
