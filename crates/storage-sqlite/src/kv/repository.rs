use linkhub_core::storage::KeyValueStore;
use linkhub_core::Result;
use log::debug;
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

use crate::db::{get_connection, Database, StorageResult};

/// Stored entry with its last modification time (RFC 3339).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValueEntry {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

pub struct KeyValueRepository {
    db: Arc<Database>,
}

impl KeyValueRepository {
    pub fn new(db: Arc<Database>) -> Self {
        KeyValueRepository { db }
    }

    pub fn get_entry(&self, key: &str) -> StorageResult<Option<KeyValueEntry>> {
        let conn = get_connection(&self.db);
        let entry = conn
            .query_row(
                "SELECT key, value, updated_at FROM kv_entries WHERE key = ?1",
                params![key],
                |row| {
                    Ok(KeyValueEntry {
                        key: row.get(0)?,
                        value: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    pub fn list_keys(&self) -> StorageResult<Vec<String>> {
        let conn = get_connection(&self.db);
        let mut stmt = conn.prepare("SELECT key FROM kv_entries ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    fn set_impl(&self, key: &str, value: &str) -> StorageResult<()> {
        let conn = get_connection(&self.db);
        conn.execute(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().to_rfc3339()],
        )?;
        debug!("[Storage] Wrote {} ({} bytes)", key, value.len());
        Ok(())
    }

    fn remove_impl(&self, key: &str) -> StorageResult<()> {
        let conn = get_connection(&self.db);
        conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl KeyValueStore for KeyValueRepository {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entry = self.get_entry(key)?;
        Ok(entry.map(|entry| entry.value))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        Ok(self.set_impl(key, value)?)
    }

    fn remove(&self, key: &str) -> Result<()> {
        Ok(self.remove_impl(key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository() -> KeyValueRepository {
        KeyValueRepository::new(Database::open_in_memory().unwrap())
    }

    #[test]
    fn upsert_replaces_value() {
        let repo = repository();
        repo.set("linkhub.lastSave", "1").unwrap();
        repo.set("linkhub.lastSave", "2").unwrap();
        assert_eq!(repo.get("linkhub.lastSave").unwrap().as_deref(), Some("2"));
        assert_eq!(repo.list_keys().unwrap(), vec!["linkhub.lastSave".to_string()]);
    }

    #[test]
    fn remove_missing_key_is_not_an_error() {
        let repo = repository();
        repo.remove("nothing").unwrap();
        assert!(repo.get("nothing").unwrap().is_none());
        assert!(repo.get_entry("nothing").unwrap().is_none());
    }
}
