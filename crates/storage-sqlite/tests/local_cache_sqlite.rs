use std::sync::Arc;

use linkhub_core::storage::{KeyValueStore, LAST_LOCAL_SAVE_KEY, STATE_KEY};
use linkhub_core::sync::ManualClock;
use linkhub_core::{AppState, LocalStateCache, Record};
use linkhub_storage_sqlite::{Database, KeyValueRepository};
use tempfile::tempdir;

#[tokio::test]
async fn state_survives_reopening_the_database() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("linkhub.db");
    let clock = Arc::new(ManualClock::at(1_700_000_000_000));

    {
        let repo = Arc::new(KeyValueRepository::new(Database::open(&path).unwrap()));
        let cache = LocalStateCache::load(repo, clock.clone());
        cache.update(|state| {
            state.links.push(Record::new("l1").with_field("title", "Runbook"));
            state.change_requests.push(Record::new("c1"));
        });
        cache.flush().await;
    }

    let repo = Arc::new(KeyValueRepository::new(Database::open(&path).unwrap()));
    let entry = repo.get_entry(STATE_KEY).unwrap().unwrap();
    assert!(!entry.updated_at.is_empty());
    assert_eq!(
        repo.get(LAST_LOCAL_SAVE_KEY).unwrap().as_deref(),
        Some("1700000000000")
    );

    let cache = LocalStateCache::load(repo, clock);
    let state = cache.get_state();
    assert_eq!(state.links[0].fields()["title"], "Runbook");
    assert_eq!(state.change_requests.len(), 1);
    assert!(cache.has_stored_state());
}

#[tokio::test]
async fn clear_removes_rows() {
    let repo = Arc::new(KeyValueRepository::new(Database::open_in_memory().unwrap()));
    let cache = LocalStateCache::load(repo.clone(), Arc::new(ManualClock::at(5)));
    cache.set_state({
        let mut state = AppState::default();
        state.services.push(Record::new("s1"));
        state
    });
    cache.flush().await;
    assert_eq!(repo.list_keys().unwrap().len(), 2);

    cache.clear().await.unwrap();
    assert!(repo.list_keys().unwrap().is_empty());
}
