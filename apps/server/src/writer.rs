//! Splits an aggregate push into per-collection resource writes.
//!
//! Each resource goes through its own read-version / conditional-write cycle.
//! A failure on one path is recorded and the remaining paths are still
//! written; there is no atomicity across files.

use linkhub_core::state::normalize;
use linkhub_core::state::schema::resource_document;
use linkhub_core::sync::{SyncResult, WriteOutcome};
use linkhub_core::Collection;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ResourceLayout;
use crate::store::{StoreError, VersionedStore};

/// One file to write.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceWrite {
    pub collection: Collection,
    pub path: String,
    pub document: Value,
}

impl ResourceWrite {
    pub fn commit_message(&self) -> String {
        format!("chore: autosave {}", self.path)
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut bytes = serde_json::to_vec_pretty(&self.document)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Map a push payload onto the five resource files. Collections missing from
/// the payload are written as empty arrays.
pub fn decompose(payload: &Value, layout: &ResourceLayout) -> Vec<ResourceWrite> {
    let state = normalize(payload);
    Collection::ALL
        .into_iter()
        .map(|collection| ResourceWrite {
            collection,
            path: layout.path(collection),
            document: resource_document(collection, state.collection(collection)),
        })
        .collect()
}

/// Read the current version of the path, then write against it.
pub async fn write_one(store: &dyn VersionedStore, write: &ResourceWrite) -> WriteOutcome {
    let content = match write.encode() {
        Ok(content) => content,
        Err(e) => return WriteOutcome::Failed(format!("encode failed: {}", e)),
    };

    let current = match store.read_version(&write.path).await {
        Ok(current) => current,
        Err(e) => return WriteOutcome::Failed(e.to_string()),
    };
    debug!(
        "[Writer] {} current version: {}",
        write.path,
        current.as_ref().map(|v| v.as_str()).unwrap_or("<none>")
    );

    match store
        .write(
            &write.path,
            &content,
            current.as_ref(),
            &write.commit_message(),
        )
        .await
    {
        Ok(version) if current.is_none() => WriteOutcome::Created(version),
        Ok(version) => WriteOutcome::Updated(version),
        Err(StoreError::Conflict(_)) => WriteOutcome::VersionConflict,
        Err(e) => WriteOutcome::Failed(e.to_string()),
    }
}

/// Write every resource in order and collect one result per path.
pub async fn write_all(store: &dyn VersionedStore, writes: &[ResourceWrite]) -> Vec<SyncResult> {
    let mut results = Vec::with_capacity(writes.len());
    for write in writes {
        let outcome = write_one(store, write).await;
        if outcome.is_success() {
            debug!("[Writer] {} {}", write.path, outcome.label());
        } else {
            warn!("[Writer] {} {}: {:?}", write.path, outcome.label(), outcome);
        }
        results.push(outcome.into_sync_result(write.path.clone()));
    }

    let written = results.iter().filter(|result| result.ok).count();
    info!(
        "[Writer] Wrote {}/{} resources to {} store",
        written,
        results.len(),
        store.name()
    );
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn decompose_fills_missing_collections_and_maps_legacy_key() {
        let payload = json!({
            "links": [{ "id": "l1", "url": "https://example.org" }],
            "op": [{ "id": "p1" }],
        });
        let writes = decompose(&payload, &ResourceLayout::default());
        assert_eq!(writes.len(), 5);

        let open_points = writes
            .iter()
            .find(|w| w.collection == Collection::OpenPoints)
            .unwrap();
        assert_eq!(open_points.path, "data/open-points.json");
        assert_eq!(open_points.document, json!({ "openPoints": [{ "id": "p1" }] }));

        let services = writes
            .iter()
            .find(|w| w.collection == Collection::Services)
            .unwrap();
        assert_eq!(services.document, json!({ "services": [] }));
    }

    #[tokio::test]
    async fn create_then_update_uses_fresh_version() {
        let store = MemoryStore::new();
        let writes = decompose(&json!({ "crq": [{ "id": "c1" }] }), &ResourceLayout::default());
        let crq = writes
            .iter()
            .find(|w| w.collection == Collection::ChangeRequests)
            .unwrap();

        assert!(matches!(write_one(&store, crq).await, WriteOutcome::Created(_)));
        assert!(matches!(write_one(&store, crq).await, WriteOutcome::Updated(_)));
        assert_eq!(store.write_count(), 2);

        let stored = store.read("data/crq.json").await.unwrap().unwrap();
        let value: Value = serde_json::from_slice(&stored.content).unwrap();
        assert_eq!(value, json!({ "crq": [{ "id": "c1" }] }));
    }

    #[tokio::test]
    async fn one_conflict_does_not_block_other_paths() {
        let store = MemoryStore::new();
        let layout = ResourceLayout::default();
        for collection in Collection::ALL {
            store.seed(&layout.path(collection), b"{}").await;
        }
        store.race_next_write("data/services.json").await;

        let results = write_all(&store, &decompose(&json!({}), &layout)).await;
        assert_eq!(results.len(), 5);
        let failed: Vec<_> = results.iter().filter(|r| !r.ok).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].path, "data/services.json");
        assert!(failed[0].error.as_deref().unwrap().contains("version conflict"));
    }
}
