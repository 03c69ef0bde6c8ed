use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{CaseState, ChatMessage, Facts};

const SCHEMA_SQL: &str = include_str!("../schema.sql");

/// Session persistence keyed by (user_id, session_id). The single
/// connection mutex guarantees at-most-one concurrent writer per session,
/// so duplicate requests cannot race a lost update.
pub struct SessionStore {
    conn: Mutex<Connection>,
}

// ── Row types ─────────────────────────────────────────────────────────────

/// Summary row returned by session listings.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub date: String,
    pub timestamp: i64,
    #[serde(rename = "isRenamed")]
    pub is_renamed: bool,
}

/// Full per-session snapshot persisted at the end of each turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub title: String,
    pub date: String,
    pub timestamp: i64,
    #[serde(default)]
    pub is_renamed: bool,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub facts: Facts,
    #[serde(default)]
    pub strategy: Option<String>,
    /// Last-known pipeline state, used to rehydrate the next turn.
    #[serde(default)]
    pub backend_state: Option<CaseState>,
}

// ── Helpers ───────────────────────────────────────────────────────────────

fn now_str() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Parse a persisted JSON column, falling back to the default on damage so
/// one corrupt row cannot take a session (or its listing) down.
fn parse_json_column<T: serde::de::DeserializeOwned + Default>(raw: &str, what: &str) -> T {
    match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!("corrupt {what} column, using default: {e}");
            T::default()
        }
    }
}

fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionSummary> {
    let is_renamed: i64 = row.get(4)?;
    Ok(SessionSummary {
        id: row.get(0)?,
        title: row.get(1)?,
        date: row.get(2)?,
        timestamp: row.get(3)?,
        is_renamed: is_renamed != 0,
    })
}

fn row_to_snapshot(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionSnapshot> {
    let is_renamed: i64 = row.get(4)?;
    let messages_raw: String = row.get(5)?;
    let facts_raw: String = row.get(6)?;
    let backend_state_raw: Option<String> = row.get(8)?;
    Ok(SessionSnapshot {
        session_id: row.get(0)?,
        title: row.get(1)?,
        date: row.get(2)?,
        timestamp: row.get(3)?,
        is_renamed: is_renamed != 0,
        messages: parse_json_column(&messages_raw, "messages"),
        facts: parse_json_column(&facts_raw, "facts"),
        strategy: row.get(7)?,
        backend_state: backend_state_raw
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("corrupt backend_state column, dropping: {e}");
                    None
                }
            }),
    })
}

// ── SessionStore impl ─────────────────────────────────────────────────────

impl SessionStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open SQLite database at {path:?}"))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .context("failed to set PRAGMAs")?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute_batch(SCHEMA_SQL)
            .context("failed to apply schema migrations")?;
        Ok(())
    }

    /// All session summaries for a user, newest first.
    pub fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionSummary>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(
            "SELECT session_id, title, date, timestamp, is_renamed \
             FROM sessions WHERE user_id = ?1 ORDER BY timestamp DESC",
        )?;
        let sessions = stmt
            .query_map(params![user_id], row_to_summary)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("list_sessions")?;
        Ok(sessions)
    }

    pub fn get_session(&self, user_id: &str, session_id: &str) -> Result<Option<SessionSnapshot>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let result = conn
            .query_row(
                "SELECT session_id, title, date, timestamp, is_renamed, \
                 messages, facts, strategy, backend_state \
                 FROM sessions WHERE user_id = ?1 AND session_id = ?2",
                params![user_id, session_id],
                row_to_snapshot,
            )
            .optional()
            .context("get_session")?;
        Ok(result)
    }

    /// Insert or update a session snapshot.
    pub fn save_session(&self, user_id: &str, snapshot: &SessionSnapshot) -> Result<()> {
        let messages = serde_json::to_string(&snapshot.messages).context("serialize messages")?;
        let facts = serde_json::to_string(&snapshot.facts).context("serialize facts")?;
        let backend_state = snapshot
            .backend_state
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("serialize backend_state")?;

        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT INTO sessions \
             (user_id, session_id, title, date, timestamp, is_renamed, \
              messages, facts, strategy, backend_state, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
             ON CONFLICT (user_id, session_id) DO UPDATE SET \
               title = excluded.title, date = excluded.date, \
               timestamp = excluded.timestamp, is_renamed = excluded.is_renamed, \
               messages = excluded.messages, facts = excluded.facts, \
               strategy = excluded.strategy, backend_state = excluded.backend_state, \
               updated_at = excluded.updated_at",
            params![
                user_id,
                snapshot.session_id,
                snapshot.title,
                snapshot.date,
                snapshot.timestamp,
                snapshot.is_renamed as i64,
                messages,
                facts,
                snapshot.strategy,
                backend_state,
                now_str(),
            ],
        )
        .context("save_session")?;
        Ok(())
    }

    /// Delete a session. Deleting a missing session is not an error.
    pub fn delete_session(&self, user_id: &str, session_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "DELETE FROM sessions WHERE user_id = ?1 AND session_id = ?2",
            params![user_id, session_id],
        )
        .context("delete_session")?;
        Ok(())
    }

    /// Rename a session and mark it user-renamed. Returns false if the
    /// session does not exist.
    pub fn rename_session(&self, user_id: &str, session_id: &str, title: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let changed = conn
            .execute(
                "UPDATE sessions SET title = ?1, is_renamed = 1, updated_at = ?2 \
                 WHERE user_id = ?3 AND session_id = ?4",
                params![title, now_str(), user_id, session_id],
            )
            .context("rename_session")?;
        Ok(changed > 0)
    }
}
