//! SQLite-backed durable tier for the LinkHub local state cache.

pub mod db;
pub mod errors;
pub mod kv;

pub use db::Database;
pub use errors::StorageError;
pub use kv::KeyValueRepository;
