//! Database module for Astra Chat
//!
//! Provides per-user persistence for completed conversation turns.

mod schema;

pub use schema::*;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Turn not found: {0}")]
    TurnNotFound(String),
    #[error("Tag encoding failed: {0}")]
    Tags(#[from] serde_json::Error),
    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

pub type DbResult<T> = Result<T, DbError>;

const TURN_COLUMNS: &str = "id, prompt, response, created_at, is_favorite, tags";

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    // ==================== Turn Operations ====================

    /// Store a completed turn for `user_id`
    pub fn create_turn(
        &self,
        user_id: &str,
        prompt: &str,
        response: &str,
        tags: &[String],
    ) -> DbResult<ConversationTurn> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let tags_json = serde_json::to_string(tags)?;

        self.conn()?.execute(
            "INSERT INTO chat_history (id, user_id, prompt, response, is_favorite, tags, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
            params![
                id,
                user_id,
                prompt,
                response,
                tags_json,
                now.to_rfc3339_opts(SecondsFormat::Micros, true)
            ],
        )?;

        Ok(ConversationTurn {
            id,
            prompt: prompt.to_string(),
            response: response.to_string(),
            created_at: now,
            is_favorite: false,
            tags: tags.to_vec(),
        })
    }

    /// Get a turn owned by `user_id`
    #[allow(dead_code)] // Used in tests
    pub fn get_turn(&self, user_id: &str, id: &str) -> DbResult<ConversationTurn> {
        let conn = self.conn()?;
        Self::get_turn_locked(&conn, user_id, id)
    }

    fn get_turn_locked(conn: &Connection, user_id: &str, id: &str) -> DbResult<ConversationTurn> {
        conn.query_row(
            &format!("SELECT {TURN_COLUMNS} FROM chat_history WHERE id = ?1 AND user_id = ?2"),
            params![id, user_id],
            parse_turn_row,
        )
        .optional()?
        .ok_or_else(|| DbError::TurnNotFound(id.to_string()))
    }

    /// Newest turns first, at most `limit` (capped at [`HistoryQuery::MAX_LIMIT`])
    pub fn list_recent(&self, user_id: &str, limit: u32) -> DbResult<Vec<ConversationTurn>> {
        let limit = limit.min(HistoryQuery::MAX_LIMIT);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TURN_COLUMNS} FROM chat_history WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        ))?;

        let turns = stmt
            .query_map(params![user_id, i64::from(limit)], parse_turn_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(turns)
    }

    /// One page of history, newest first, optionally favorites only
    pub fn list_page(&self, user_id: &str, query: &HistoryQuery) -> DbResult<HistoryPage> {
        let query = query.normalized();
        let conn = self.conn()?;

        let filter = if query.favorite_only {
            "WHERE user_id = ?1 AND is_favorite = 1"
        } else {
            "WHERE user_id = ?1"
        };

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM chat_history {filter}"),
            params![user_id],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {TURN_COLUMNS} FROM chat_history {filter}
             ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3"
        ))?;
        let offset = i64::try_from(query.offset()).unwrap_or(i64::MAX);
        let turns = stmt
            .query_map(
                params![user_id, i64::from(query.limit), offset],
                parse_turn_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(HistoryPage {
            turns,
            pagination: Pagination::new(&query, u64::try_from(total).unwrap_or(0)),
        })
    }

    /// Flip the favorite flag and return the updated turn
    pub fn toggle_favorite(&self, user_id: &str, id: &str) -> DbResult<ConversationTurn> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE chat_history SET is_favorite = NOT is_favorite WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        if updated == 0 {
            return Err(DbError::TurnNotFound(id.to_string()));
        }
        Self::get_turn_locked(&conn, user_id, id)
    }

    /// Delete a turn owned by `user_id`
    pub fn delete_turn(&self, user_id: &str, id: &str) -> DbResult<()> {
        let deleted = self.conn()?.execute(
            "DELETE FROM chat_history WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        if deleted == 0 {
            return Err(DbError::TurnNotFound(id.to_string()));
        }
        Ok(())
    }
}

fn parse_turn_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationTurn> {
    let tags_json: String = row.get(5)?;
    Ok(ConversationTurn {
        id: row.get(0)?,
        prompt: row.get(1)?,
        response: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
        is_favorite: row.get(4)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
