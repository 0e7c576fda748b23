//! Stored row types

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use super::error::{StoreError, StoreResult};

/// Storage format for timestamps. Fixed width, so text order is time order.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp; accepts SQLite's `CURRENT_TIMESTAMP` shape too
pub(crate) fn parse_timestamp(id: i64, value: &str) -> StoreResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .map(|naive| naive.and_utc())
        .map_err(|_| StoreError::Timestamp {
            id,
            value: value.to_string(),
        })
}

/// One persisted prompt/response exchange
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Row id, assigned by the database
    pub id: i64,
    /// Use-case tab the exchange belongs to
    pub tab_name: String,
    /// Creation time (UTC)
    pub timestamp: DateTime<Utc>,
    /// What the user asked
    pub user_message: String,
    /// What the model answered (or the error text)
    pub assistant_response: String,
    /// System prompt in effect
    pub system_prompt: Option<String>,
    /// Model identifier
    pub model: Option<String>,
    /// Sampling temperature
    pub temperature: Option<f64>,
    /// Completion token budget
    pub max_tokens: Option<i64>,
    /// Owning session
    pub session_id: Option<String>,
}

impl ConversationRecord {
    /// Column list matching [`ConversationRecord::from_row`]
    pub(crate) const COLUMNS: &'static str = "id, tab_name, timestamp, user_message, \
         assistant_response, system_prompt, model, temperature, max_tokens, session_id";

    /// Map a row selected with [`Self::COLUMNS`]
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let id: i64 = row.get(0)?;
        let raw: String = row.get(2)?;
        let timestamp = parse_timestamp(id, &raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
        })?;

        Ok(Self {
            id,
            tab_name: row.get(1)?,
            timestamp,
            user_message: row.get(3)?,
            assistant_response: row.get(4)?,
            system_prompt: row.get(5)?,
            model: row.get(6)?,
            temperature: row.get(7)?,
            max_tokens: row.get(8)?,
            session_id: row.get(9)?,
        })
    }
}

/// Insert-side shape of a [`ConversationRecord`]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewMessage {
    /// Use-case tab
    pub tab_name: String,
    /// What the user asked
    pub user_message: String,
    /// What the model answered
    pub assistant_response: String,
    /// System prompt in effect
    pub system_prompt: Option<String>,
    /// Model identifier
    pub model: Option<String>,
    /// Sampling temperature
    pub temperature: Option<f64>,
    /// Completion token budget
    pub max_tokens: Option<i64>,
    /// Owning session; generated when absent
    pub session_id: Option<String>,
}

impl NewMessage {
    /// Minimal message for a tab
    pub fn new(
        tab_name: impl Into<String>,
        user_message: impl Into<String>,
        assistant_response: impl Into<String>,
    ) -> Self {
        Self {
            tab_name: tab_name.into(),
            user_message: user_message.into(),
            assistant_response: assistant_response.into(),
            ..Self::default()
        }
    }

    /// Attach a session id
    #[must_use]
    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach the model and parameters used
    #[must_use]
    pub fn with_generation(
        mut self,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        self.model = Some(model.into());
        self.temperature = Some(f64::from(temperature));
        self.max_tokens = Some(i64::from(max_tokens));
        self
    }

    /// Attach the system prompt
    #[must_use]
    pub fn with_system(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }
}

/// Session bookkeeping row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Unique session id
    pub session_id: String,
    /// First save in the session
    pub created_at: DateTime<Utc>,
    /// Most recent save
    pub last_activity: DateTime<Utc>,
    /// Saves recorded in the session
    pub total_messages: i64,
}

/// Conversation count for one tab
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TabCount {
    /// Tab name
    pub tab_name: String,
    /// Records in the tab
    pub count: u64,
}

/// Aggregate store statistics
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoreStatus {
    /// All records
    pub total_conversations: u64,
    /// Per-tab counts, largest first
    pub conversations_by_tab: Vec<TabCount>,
    /// Records from the last 24 hours
    pub recent_activity: u64,
    /// Size of the database file
    pub database_size_bytes: u64,
}

impl StoreStatus {
    /// Database size in megabytes, rounded to 2 decimals
    #[must_use]
    pub fn database_size_mb(&self) -> f64 {
        let mb = self.database_size_bytes as f64 / (1024.0 * 1024.0);
        (mb * 100.0).round() / 100.0
    }
}

/// Aggregate session statistics
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionStats {
    /// All sessions
    pub total_sessions: u64,
    /// Sessions active in the last 24 hours
    pub active_sessions: u64,
    /// Mean saves per session, rounded to 2 decimals
    pub average_messages_per_session: f64,
}
