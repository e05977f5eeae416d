//! Push, combined load, per-resource reads and diagnostics.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::future::join_all;
use linkhub_core::state::schema::{extract_collection, parse_resource_document, resource_document};
use linkhub_core::sync::PushResponse;
use linkhub_core::{AppState, Collection, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::main_lib::GatewayState;
use crate::store::{StoreError, VersionedStore};
use crate::writer::{decompose, write_all};

const SERVICE_NAME: &str = "linkhub-gateway";

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RootQuery {
    pub op: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    pub allowed_origins: Vec<String>,
    pub origin_matched: bool,
    pub owner: bool,
    pub repo: bool,
    pub token: bool,
    pub branch: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Reads
// ─────────────────────────────────────────────────────────────────────────────

async fn get_root(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<RootQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    if query.op.as_deref() == Some("load") {
        let combined = load_combined(&state).await?;
        return Ok(Json(combined).into_response());
    }

    let origin = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(|origin| origin.trim_end_matches('/'));
    let repository = &state.config.repository;
    let diagnostics = DiagnosticsResponse {
        ok: true,
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        allowed_origins: state.config.origins.entries(),
        origin_matched: state.config.origins.allows(origin),
        owner: repository.owner.is_some(),
        repo: repository.repo.is_some(),
        token: repository.token.is_some(),
        branch: repository.branch.clone(),
    };
    Ok(([(header::CACHE_CONTROL, "no-store")], Json(diagnostics)).into_response())
}

/// Outcome of reading one collection's resource.
enum ResourceRead {
    Found { records: Vec<Record>, document: Value },
    Absent,
    Failed(StoreError),
}

async fn read_resource(store: &dyn VersionedStore, path: &str, collection: Collection) -> ResourceRead {
    let file = match store.read(path).await {
        Ok(Some(file)) => file,
        Ok(None) => return ResourceRead::Absent,
        Err(e) => return ResourceRead::Failed(e),
    };
    let document = serde_json::from_slice::<Value>(&file.content).ok();
    match document
        .as_ref()
        .and_then(|value| parse_resource_document(value, collection))
    {
        Some(records) => ResourceRead::Found {
            records,
            document: document.unwrap_or_default(),
        },
        None => ResourceRead::Failed(StoreError::Decode(format!(
            "{} is not a {} document",
            path, collection
        ))),
    }
}

/// Older repositories keep sections inside the links document.
fn embedded_sections(links: &ResourceRead) -> Option<Vec<Record>> {
    match links {
        ResourceRead::Found { document, .. } => extract_collection(document, Collection::Sections),
        _ => None,
    }
}

/// Read every resource. Any unreadable resource fails the whole load with 502
/// so clients fall back to per-resource reads instead of taking an empty
/// collection as authoritative.
async fn load_combined(state: &GatewayState) -> ApiResult<AppState> {
    let store = state.store()?;
    let layout = &state.config.layout;

    let reads = join_all(Collection::ALL.into_iter().map(|collection| async move {
        let path = layout.path(collection);
        let read = read_resource(store, &path, collection).await;
        (collection, path, read)
    }))
    .await;

    let legacy_sections = reads
        .iter()
        .find(|(collection, _, _)| *collection == Collection::Links)
        .and_then(|(_, _, read)| embedded_sections(read));

    let mut combined = AppState::default();
    let mut failures = Vec::new();
    for (collection, path, read) in reads {
        match read {
            ResourceRead::Found { records, .. } => combined.set_collection(collection, records),
            ResourceRead::Absent | ResourceRead::Failed(_)
                if collection == Collection::Sections && legacy_sections.is_some() =>
            {
                debug!("[Sync] Using sections from the links document instead of {}", path);
                combined.set_collection(collection, legacy_sections.clone().unwrap_or_default());
            }
            ResourceRead::Absent => {}
            ResourceRead::Failed(e) => {
                warn!("[Sync] Combined load could not read {}: {}", path, e);
                failures.push(format!("{}: {}", path, e));
            }
        }
    }

    if !failures.is_empty() {
        return Err(ApiError::BadGateway(failures.join("; ")));
    }
    Ok(combined)
}

async fn get_resource(
    State(state): State<Arc<GatewayState>>,
    Path(file): Path<String>,
) -> ApiResult<Json<Value>> {
    let collection = Collection::from_resource_file(&file)
        .ok_or_else(|| ApiError::NotFound("Not Found".to_string()))?;
    let store = state.store()?;
    let layout = &state.config.layout;
    let path = layout.path(collection);

    let read = match read_resource(store, &path, collection).await {
        ResourceRead::Found { records, .. } => {
            return Ok(Json(resource_document(collection, &records)))
        }
        other => other,
    };
    if collection == Collection::Sections {
        let links_path = layout.path(Collection::Links);
        let links = read_resource(store, &links_path, Collection::Links).await;
        if let Some(sections) = embedded_sections(&links) {
            debug!("[Sync] Serving sections from {}", links_path);
            return Ok(Json(resource_document(collection, &sections)));
        }
    }

    match read {
        ResourceRead::Failed(e) => Err(ApiError::BadGateway(e.to_string())),
        _ => Err(ApiError::NotFound(format!("{} not found", path))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Push
// ─────────────────────────────────────────────────────────────────────────────

async fn push(
    State(state): State<Arc<GatewayState>>,
    body: Bytes,
) -> ApiResult<Json<PushResponse>> {
    let store = state.store()?;

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest("Invalid JSON object".to_string()))?;
    if !payload.is_object() {
        return Err(ApiError::BadRequest("Invalid JSON object".to_string()));
    }

    let writes = decompose(&payload, &state.config.layout);
    let results = write_all(store, &writes).await;
    let response = PushResponse::from_results(results);

    if !response.ok {
        let summary = response
            .results
            .iter()
            .map(|result| {
                format!(
                    "{}: {}",
                    result.path,
                    result.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ApiError::BadGateway(format!("All writes failed: {}", summary)));
    }

    info!(
        "[Sync] Push stored {}/{} resources",
        response.results.len() - response.failed_results().len(),
        response.results.len()
    );
    Ok(Json(response))
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router<Arc<GatewayState>> {
    Router::new()
        .route(
            "/",
            get(get_root).post(push).fallback(method_not_allowed),
        )
        .route(
            "/data/:file",
            get(get_resource).fallback(method_not_allowed),
        )
}
