//! Database connection setup and schema

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, Result};
use tracing::{debug, error, info};

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// How long a writer waits on a locked database before giving up
pub(crate) const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Open a connection configured for concurrent readers and a single writer
pub(crate) fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).map_err(|e| {
        error!("Failed to open database at {:?}: {}", path, e);
        e
    })?;

    conn.busy_timeout(BUSY_TIMEOUT)?;
    // journal_mode returns a row, so it goes through query_row
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
    conn.execute_batch(
        "PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = 1000;
         PRAGMA temp_store = MEMORY;
         PRAGMA foreign_keys = ON;",
    )
    .map_err(|e| {
        error!("Failed to configure database pragmas: {}", e);
        e
    })?;

    Ok(conn)
}

/// Bring the schema up to date
pub(crate) fn migrate(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;
    debug!("Current schema version: {}", version);

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    debug!("Setting schema version to {}", version);
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    info!("Migrating conversation store to v1");

    conn.execute_batch(
        "BEGIN;
         CREATE TABLE IF NOT EXISTS conversations (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             tab_name TEXT NOT NULL,
             timestamp TEXT NOT NULL,
             user_message TEXT NOT NULL,
             assistant_response TEXT NOT NULL,
             system_prompt TEXT,
             model TEXT,
             temperature REAL,
             max_tokens INTEGER,
             session_id TEXT
         );

         CREATE TABLE IF NOT EXISTS sessions (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             session_id TEXT UNIQUE NOT NULL,
             created_at TEXT NOT NULL,
             last_activity TEXT NOT NULL,
             total_messages INTEGER NOT NULL DEFAULT 0
         );

         CREATE INDEX IF NOT EXISTS idx_conversations_tab_name ON conversations(tab_name);
         CREATE INDEX IF NOT EXISTS idx_conversations_timestamp ON conversations(timestamp);
         CREATE INDEX IF NOT EXISTS idx_conversations_session_id ON conversations(session_id);
         COMMIT;",
    )?;

    set_schema_version(conn, SCHEMA_VERSION)
}
