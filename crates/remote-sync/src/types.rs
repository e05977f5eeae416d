//! Request/response types for the sync gateway API and pull reporting.

use linkhub_core::{AppState, Collection};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use linkhub_core::sync::{PushResponse, SyncResult};

/// Where a successful pull got its data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullSource {
    Combined,
    Fallback,
}

/// Steps taken by one pull, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullStage {
    CombinedTried,
    CombinedRecognized,
    CombinedUnrecognizedOrFailed,
    FallbackTried,
    FallbackNonEmpty,
    FallbackAllEmpty,
    Done,
    DoneEmpty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PullOutcome {
    Loaded { state: AppState, source: PullSource },
    /// Nothing anywhere. The remote may be empty or unreachable; callers must
    /// not treat this as authoritative over non-empty local data.
    EmptyRemote { state: AppState },
}

impl PullOutcome {
    pub fn state(&self) -> &AppState {
        match self {
            PullOutcome::Loaded { state, .. } | PullOutcome::EmptyRemote { state } => state,
        }
    }
}

/// A collection that degraded to empty during the fallback read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradedCollection {
    pub collection: Collection,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PullReport {
    pub outcome: PullOutcome,
    pub stages: Vec<PullStage>,
    /// Why the combined read was not used, when it failed outright.
    pub combined_error: Option<String>,
    /// An unrecognized JSON object from the combined read (typically gateway diagnostics).
    pub diagnostics: Option<Value>,
    pub degraded: Vec<DegradedCollection>,
}

impl PullReport {
    pub fn source(&self) -> Option<PullSource> {
        match &self.outcome {
            PullOutcome::Loaded { source, .. } => Some(*source),
            PullOutcome::EmptyRemote { .. } => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.combined_error.is_some() || !self.degraded.is_empty()
    }
}

/// Body of `GET <endpoint>`. Secrets are reported as presence booleans only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub origin_matched: bool,
    #[serde(default)]
    pub owner: bool,
    #[serde(default)]
    pub repo: bool,
    #[serde(default)]
    pub token: bool,
    #[serde(default)]
    pub branch: Option<String>,
}

/// Error body shape some gateways return instead of plain text.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: String,
}
