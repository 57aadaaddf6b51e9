//! Database Connection and Setup
//!
//! Manages the SQLite connection and migrations.

use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::domain::{DomainError, DomainResult};

/// Database state wrapper
pub struct DbState {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl DbState {
    pub fn new() -> Self {
        Self {
            conn: Arc::new(Mutex::new(None)),
        }
    }

    /// Shared handle to the connection slot
    pub fn connection(&self) -> Arc<Mutex<Option<Connection>>> {
        self.conn.clone()
    }

    pub async fn is_initialized(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Drop the connection; later store calls fail with `Internal`
    pub async fn close(&self) {
        *self.conn.lock().await = None;
    }
}

impl Default for DbState {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize database with path (`:memory:` for a private in-memory db)
pub async fn init_db(db_path: &Path) -> DomainResult<DbState> {
    let conn = if db_path.as_os_str() == ":memory:" {
        Connection::open_in_memory()?
    } else {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Connection::open(db_path)?
    };

    run_migrations(&conn)?;
    log::info!("Record database ready at {}", db_path.display());

    let state = DbState::new();
    *state.conn.lock().await = Some(conn);
    Ok(state)
}

/// Check if a column exists in a table
fn column_exists(conn: &Connection, table: &str, column: &str) -> bool {
    let query = format!("PRAGMA table_info({})", table);
    let Ok(mut stmt) = conn.prepare(&query) else {
        return false;
    };
    let Ok(mut rows) = stmt.query([]) else {
        return false;
    };
    while let Ok(Some(row)) = rows.next() {
        if let Ok(name) = row.get::<_, String>(1) {
            if name == column {
                return true;
            }
        }
    }
    false
}

/// Run database migrations
fn run_migrations(conn: &Connection) -> DomainResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            fields TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL,
            PRIMARY KEY (collection, id)
        )",
        [],
    )?;

    // Added after the first schema; older databases get it here
    if !column_exists(conn, "documents", "updated_at") {
        conn.execute(
            "ALTER TABLE documents ADD COLUMN updated_at INTEGER NOT NULL DEFAULT 0",
            [],
        )
        .map_err(|e| DomainError::Storage(format!("Failed to add updated_at: {}", e)))?;
    }

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, created_at)",
        [],
    )?;

    Ok(())
}
