//! `kv_entries` table: the string key-value store behind the local cache.

mod repository;

pub use repository::{KeyValueEntry, KeyValueRepository};
