//! In-process content-addressed store for development and tests.

use async_trait::async_trait;
use linkhub_core::sync::VersionToken;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use super::{StoreError, StoreResult, StoredFile, VersionedStore};

#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<String, StoredFile>>,
    /// Paths whose next write races with a simulated concurrent writer.
    races: Mutex<HashSet<String>>,
    writes: AtomicUsize,
}

fn version_of(content: &[u8]) -> VersionToken {
    let digest = Sha256::digest(content);
    VersionToken::new(
        digest
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect::<String>(),
    )
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Store a file directly, bypassing version checks.
    pub async fn seed(&self, path: &str, content: &[u8]) -> VersionToken {
        let version = version_of(content);
        self.files.lock().await.insert(
            path.to_string(),
            StoredFile {
                content: content.to_vec(),
                version: version.clone(),
            },
        );
        version
    }

    /// Make another writer change `path` between the next version read and write.
    pub async fn race_next_write(&self, path: &str) {
        self.races.lock().await.insert(path.to_string());
    }

    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.lock().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl VersionedStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn read(&self, path: &str) -> StoreResult<Option<StoredFile>> {
        Ok(self.files.lock().await.get(path).cloned())
    }

    async fn read_version(&self, path: &str) -> StoreResult<Option<VersionToken>> {
        Ok(self
            .files
            .lock()
            .await
            .get(path)
            .map(|file| file.version.clone()))
    }

    async fn write(
        &self,
        path: &str,
        content: &[u8],
        expected: Option<&VersionToken>,
        _message: &str,
    ) -> StoreResult<VersionToken> {
        if self.races.lock().await.remove(path) {
            let mut concurrent = b"concurrent:".to_vec();
            concurrent.extend_from_slice(path.as_bytes());
            self.seed(path, &concurrent).await;
        }

        let mut files = self.files.lock().await;
        let current = files.get(path).map(|file| &file.version);
        if current != expected {
            return Err(StoreError::Conflict(path.to_string()));
        }

        let version = version_of(content);
        files.insert(
            path.to_string(),
            StoredFile {
                content: content.to_vec(),
                version: version.clone(),
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(version)
    }
}
