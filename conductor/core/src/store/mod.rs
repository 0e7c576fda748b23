//! Conversation Store
//!
//! Durable, append-only log of prompt/response exchanges plus lightweight
//! session bookkeeping, backed by SQLite.
//!
//! # Concurrency
//!
//! The store holds only a path. Every operation opens its own connection and
//! runs a short transaction, so no lock outlives a call. WAL mode gives
//! concurrent readers with a single writer; writers that hit a lock wait up to
//! the busy timeout instead of failing immediately.

mod error;
mod export;
mod records;
mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::session::SessionId;

pub use error::{StoreError, StoreResult};
pub use export::ExportFormat;
pub use records::{
    ConversationRecord, NewMessage, SessionRecord, SessionStats, StoreStatus, TabCount,
};

use records::{format_timestamp, parse_timestamp};

/// Default number of records returned by history queries
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// SQLite-backed conversation log
#[derive(Clone, Debug)]
pub struct ConversationStore {
    path: PathBuf,
}

impl ConversationStore {
    /// Open (creating if needed) the database at `path` and apply the schema
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        info!("Initializing conversation store at {:?}", path);
        let store = Self { path };
        let conn = store.connect()?;
        schema::migrate(&conn)?;
        Ok(store)
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> StoreResult<Connection> {
        Ok(schema::connect(&self.path)?)
    }

    /// Persist one exchange and bump its session, atomically.
    ///
    /// Returns the new record id. A missing session id is replaced with a
    /// freshly generated one.
    pub fn save_message(&self, message: &NewMessage) -> StoreResult<i64> {
        self.save_message_at(message, Utc::now())
    }

    pub(crate) fn save_message_at(&self, message: &NewMessage, at: DateTime<Utc>) -> StoreResult<i64> {
        let session_id = message
            .session_id
            .clone()
            .unwrap_or_else(|| SessionId::generate().to_string());
        let now = format_timestamp(at);

        let mut conn = self.connect()?;
        // Dropping the transaction without commit rolls back both statements
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO conversations
                 (tab_name, timestamp, user_message, assistant_response, system_prompt,
                  model, temperature, max_tokens, session_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                message.tab_name,
                now,
                message.user_message,
                message.assistant_response,
                message.system_prompt,
                message.model,
                message.temperature,
                message.max_tokens,
                session_id,
            ],
        )?;
        let id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO sessions (session_id, created_at, last_activity, total_messages)
             VALUES (?1, ?2, ?2, 1)
             ON CONFLICT(session_id) DO UPDATE SET
                 last_activity = MAX(last_activity, excluded.last_activity),
                 total_messages = total_messages + 1",
            params![session_id, now],
        )?;

        tx.commit()?;
        debug!(id, tab = %message.tab_name, session = %session_id, "Message saved");
        Ok(id)
    }

    fn query_records<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> StoreResult<Vec<ConversationRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, ConversationRecord::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Records for one tab, newest first
    pub fn get_history(&self, tab_name: &str, limit: usize) -> StoreResult<Vec<ConversationRecord>> {
        let sql = format!(
            "SELECT {} FROM conversations WHERE tab_name = ?1
             ORDER BY timestamp DESC, id DESC LIMIT ?2",
            ConversationRecord::COLUMNS
        );
        self.query_records(&sql, params![tab_name, clamp_limit(limit)])
    }

    /// Newest records across all tabs
    pub fn recent(&self, limit: usize) -> StoreResult<Vec<ConversationRecord>> {
        let sql = format!(
            "SELECT {} FROM conversations ORDER BY timestamp DESC, id DESC LIMIT ?1",
            ConversationRecord::COLUMNS
        );
        self.query_records(&sql, params![clamp_limit(limit)])
    }

    /// Records whose user or assistant text contains `query`, newest first.
    ///
    /// Matching is a case-sensitive literal substring test; `%` and `_` in
    /// the query match themselves.
    pub fn search(&self, query: &str, tab_name: Option<&str>) -> StoreResult<Vec<ConversationRecord>> {
        let matches = "(instr(user_message, ?1) > 0 OR instr(assistant_response, ?1) > 0)";
        match tab_name {
            Some(tab) => {
                let sql = format!(
                    "SELECT {} FROM conversations WHERE tab_name = ?2 AND {matches}
                     ORDER BY timestamp DESC, id DESC",
                    ConversationRecord::COLUMNS
                );
                self.query_records(&sql, params![query, tab])
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM conversations WHERE {matches}
                     ORDER BY timestamp DESC, id DESC",
                    ConversationRecord::COLUMNS
                );
                self.query_records(&sql, params![query])
            }
        }
    }

    /// Delete every conversation and session. Returns conversations deleted.
    pub fn clear_all(&self) -> StoreResult<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let deleted = tx.execute("DELETE FROM conversations", [])?;
        tx.execute("DELETE FROM sessions", [])?;
        tx.commit()?;
        info!(deleted, "Cleared all conversations");
        Ok(deleted)
    }

    /// Delete one tab's conversations. Returns conversations deleted.
    pub fn clear_tab(&self, tab_name: &str) -> StoreResult<usize> {
        let conn = self.connect()?;
        let deleted = conn.execute("DELETE FROM conversations WHERE tab_name = ?1", [tab_name])?;
        info!(deleted, tab = %tab_name, "Cleared tab");
        Ok(deleted)
    }

    /// Every record, oldest first
    pub fn all_records(&self) -> StoreResult<Vec<ConversationRecord>> {
        let sql = format!(
            "SELECT {} FROM conversations ORDER BY timestamp ASC, id ASC",
            ConversationRecord::COLUMNS
        );
        self.query_records(&sql, [])
    }

    /// Serialize every record
    pub fn export_all(&self, format: ExportFormat) -> StoreResult<String> {
        export::render(&self.all_records()?, format)
    }

    /// Write an export to `conversations_export_<timestamp>.<ext>` under `dir`
    pub fn export_to_file(&self, dir: impl AsRef<Path>, format: ExportFormat) -> StoreResult<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let file_name = format!(
            "conversations_export_{}.{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            format.extension()
        );
        let path = dir.join(file_name);
        let body = self.export_all(format)?;

        fs::write(&path, body).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = ?path, %format, "Exported conversations");
        Ok(path)
    }

    /// Aggregate counts and storage size
    pub fn status(&self) -> StoreResult<StoreStatus> {
        let conn = self.connect()?;

        let total: i64 = conn.query_row("SELECT COUNT(*) FROM conversations", [], |r| r.get(0))?;

        let mut stmt = conn.prepare(
            "SELECT tab_name, COUNT(*) AS count FROM conversations
             GROUP BY tab_name ORDER BY count DESC, tab_name ASC",
        )?;
        let by_tab = stmt
            .query_map([], |row| {
                Ok(TabCount {
                    tab_name: row.get(0)?,
                    count: row.get::<_, i64>(1)?.max(0) as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let cutoff = format_timestamp(Utc::now() - ChronoDuration::days(1));
        let recent: i64 = conn.query_row(
            "SELECT COUNT(*) FROM conversations WHERE timestamp > ?1",
            [cutoff],
            |r| r.get(0),
        )?;

        let size = self.size_on_disk();

        Ok(StoreStatus {
            total_conversations: total.max(0) as u64,
            conversations_by_tab: by_tab,
            recent_activity: recent.max(0) as u64,
            database_size_bytes: size,
        })
    }

    /// Database file plus its write-ahead log, which holds recent writes
    /// until a checkpoint copies them back
    fn size_on_disk(&self) -> u64 {
        let mut wal = self.path.clone().into_os_string();
        wal.push("-wal");

        [self.path.as_path(), Path::new(&wal)]
            .iter()
            .filter_map(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .sum()
    }

    /// Session counts and average messages per session
    pub fn session_statistics(&self) -> StoreResult<SessionStats> {
        let conn = self.connect()?;
        let cutoff = format_timestamp(Utc::now() - ChronoDuration::days(1));

        let (total, active, average): (i64, i64, Option<f64>) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN last_activity > ?1 THEN 1 ELSE 0 END), 0),
                    AVG(total_messages)
             FROM sessions",
            [cutoff],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?;

        Ok(SessionStats {
            total_sessions: total.max(0) as u64,
            active_sessions: active.max(0) as u64,
            average_messages_per_session: (average.unwrap_or(0.0) * 100.0).round() / 100.0,
        })
    }

    /// Look up one session's bookkeeping row
    pub fn session(&self, session_id: &str) -> StoreResult<Option<SessionRecord>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT session_id, created_at, last_activity, total_messages
                 FROM sessions WHERE session_id = ?1",
                [session_id],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(session_id, created, last, total_messages)| {
            Ok(SessionRecord {
                created_at: parse_timestamp(0, &created)?,
                last_activity: parse_timestamp(0, &last)?,
                session_id,
                total_messages,
            })
        })
        .transpose()
    }

    /// Delete records older than `days` days. Returns how many were removed.
    pub fn cleanup(&self, days: u32) -> StoreResult<usize> {
        let cutoff = format_timestamp(Utc::now() - ChronoDuration::days(i64::from(days)));
        let conn = self.connect()?;
        let deleted = conn.execute("DELETE FROM conversations WHERE timestamp < ?1", [cutoff])?;
        info!(deleted, days, "Removed old conversations");
        Ok(deleted)
    }
}

/// `<data_dir>/cyberdesk/conversations.db`, falling back to the working directory
#[must_use]
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("cyberdesk"))
        .unwrap_or_else(|| PathBuf::from("database"))
        .join("conversations.db")
}

fn clamp_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
