//! Versioned file stores behind the gateway.

mod github;
mod memory;

pub use github::GitHubStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use linkhub_core::sync::VersionToken;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The expected version no longer matches (or the file appeared meanwhile).
    #[error("version conflict on {0}")]
    Conflict(String),

    #[error("backing store unavailable: {0}")]
    Unavailable(String),

    #[error("backing store error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("undecodable content: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub content: Vec<u8>,
    pub version: VersionToken,
}

/// File storage with read-with-version and conditional write.
#[async_trait]
pub trait VersionedStore: Send + Sync {
    fn name(&self) -> &'static str;

    /// Content and version, `None` when the path does not exist.
    async fn read(&self, path: &str) -> StoreResult<Option<StoredFile>>;

    /// Current version only, `None` when the path does not exist.
    async fn read_version(&self, path: &str) -> StoreResult<Option<VersionToken>>;

    /// Write `content` if the current version equals `expected`.
    ///
    /// `expected = None` means "create": it fails with [`StoreError::Conflict`]
    /// when the path already exists.
    async fn write(
        &self,
        path: &str,
        content: &[u8],
        expected: Option<&VersionToken>,
        message: &str,
    ) -> StoreResult<VersionToken>;
}
