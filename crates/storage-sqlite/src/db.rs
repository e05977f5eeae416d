//! Connection management and embedded migrations.

use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::errors::StorageError;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Ordered list of (version, sql). Applied once each, recorded in `schema_migrations`.
const MIGRATIONS: &[(&str, &str)] = &[(
    "2024-05-01-000000_create_kv_entries",
    include_str!("../migrations/2024-05-01-000000_create_kv_entries/up.sql"),
)];

/// Single shared connection. SQLite serializes writers anyway and the cache
/// writes at most once per debounce window.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (creating if needed) the database file and apply pending migrations.
    pub fn open(path: &Path) -> StorageResult<Arc<Self>> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        info!("[Storage] Opened database at {}", path.display());
        Self::init(conn)
    }

    pub fn open_in_memory() -> StorageResult<Arc<Self>> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> StorageResult<Arc<Self>> {
        run_migrations(&mut conn)?;
        Ok(Arc::new(Self {
            conn: Mutex::new(conn),
        }))
    }
}

pub fn get_connection(db: &Database) -> MutexGuard<'_, Connection> {
    db.conn.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Apply every migration not yet recorded. Returns how many ran.
pub fn run_migrations(conn: &mut Connection) -> StorageResult<usize> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY NOT NULL,
            run_on TEXT NOT NULL
        );",
    )?;

    let mut applied = 0;
    for (version, sql) in MIGRATIONS {
        let exists: Option<String> = conn
            .query_row(
                "SELECT version FROM schema_migrations WHERE version = ?1",
                params![version],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(sql).map_err(|e| StorageError::Migration {
            version: version.to_string(),
            message: e.to_string(),
        })?;
        tx.execute(
            "INSERT INTO schema_migrations (version, run_on) VALUES (?1, ?2)",
            params![version, chrono::Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        debug!("[Storage] Applied migration {}", version);
        applied += 1;
    }
    Ok(applied)
}
