//! Sync wire models shared by the client and the gateway.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque revision of a stored resource, read fresh before every write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of one read-version/conditional-write cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// No prior version existed; the resource was created.
    Created(VersionToken),
    /// The resource was replaced against the version read just before.
    Updated(VersionToken),
    /// Another writer moved the resource between read and write.
    VersionConflict,
    /// Any other failure (transport, permissions, encoding).
    Failed(String),
}

impl WriteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Created(_) | Self::Updated(_))
    }

    /// Short status label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Updated(_) => "updated",
            Self::VersionConflict => "version_conflict",
            Self::Failed(_) => "failed",
        }
    }

    pub fn into_sync_result(self, path: impl Into<String>) -> SyncResult {
        match self {
            Self::Created(_) | Self::Updated(_) => SyncResult::ok(path),
            Self::VersionConflict => SyncResult::failed(
                path,
                "version conflict: resource changed since it was read",
            ),
            Self::Failed(message) => SyncResult::failed(path, message),
        }
    }
}

/// Per-file outcome reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub path: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncResult {
    pub fn ok(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ok: true,
            error: None,
        }
    }

    pub fn failed(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Body of a successful push response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    pub ok: bool,
    #[serde(default)]
    pub results: Vec<SyncResult>,
}

impl PushResponse {
    /// Build the response for a set of per-file results: ok when at least one wrote.
    pub fn from_results(results: Vec<SyncResult>) -> Self {
        Self {
            ok: results.iter().any(|result| result.ok),
            results,
        }
    }

    pub fn failed_results(&self) -> Vec<&SyncResult> {
        self.results.iter().filter(|result| !result.ok).collect()
    }

    /// Some, but not all, files failed.
    pub fn is_partial_failure(&self) -> bool {
        let failed = self.failed_results().len();
        failed > 0 && failed < self.results.len()
    }
}
