//! History synchronizer
//!
//! Keeps a bounded, newest-first list of the signed-in user's recent turns
//! and mirrors save, delete and favorite operations to the store. Store
//! failures are logged and leave the in-memory list untouched; chatting
//! never waits on persistence succeeding.

use crate::db::{ConversationTurn, Database, DbError, HistoryPage, HistoryQuery};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Default number of turns kept in the recent list
pub const RECENT_LIMIT: usize = 20;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Turn not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Database(DbError),
}

impl From<DbError> for PersistenceError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::TurnNotFound(id) => PersistenceError::NotFound(id),
            other => PersistenceError::Database(other),
        }
    }
}

/// User-scoped turn storage
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn list_recent(
        &self,
        user: &str,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, PersistenceError>;

    async fn list_page(
        &self,
        user: &str,
        query: HistoryQuery,
    ) -> Result<HistoryPage, PersistenceError>;

    async fn create(
        &self,
        user: &str,
        prompt: &str,
        response: &str,
        tags: &[String],
    ) -> Result<ConversationTurn, PersistenceError>;

    async fn delete(&self, user: &str, id: &str) -> Result<(), PersistenceError>;

    async fn toggle_favorite(
        &self,
        user: &str,
        id: &str,
    ) -> Result<ConversationTurn, PersistenceError>;
}

/// [`HistoryStore`] over the sqlite database
#[derive(Clone)]
pub struct DatabaseHistory {
    db: Database,
}

impl DatabaseHistory {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HistoryStore for DatabaseHistory {
    async fn list_recent(
        &self,
        user: &str,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, PersistenceError> {
        Ok(self.db.list_recent(user, limit)?)
    }

    async fn list_page(
        &self,
        user: &str,
        query: HistoryQuery,
    ) -> Result<HistoryPage, PersistenceError> {
        Ok(self.db.list_page(user, &query)?)
    }

    async fn create(
        &self,
        user: &str,
        prompt: &str,
        response: &str,
        tags: &[String],
    ) -> Result<ConversationTurn, PersistenceError> {
        Ok(self.db.create_turn(user, prompt, response, tags)?)
    }

    async fn delete(&self, user: &str, id: &str) -> Result<(), PersistenceError> {
        Ok(self.db.delete_turn(user, id)?)
    }

    async fn toggle_favorite(
        &self,
        user: &str,
        id: &str,
    ) -> Result<ConversationTurn, PersistenceError> {
        Ok(self.db.toggle_favorite(user, id)?)
    }
}

/// Bounded newest-first list of turns
#[derive(Debug, Clone)]
pub struct RecentHistory {
    turns: Vec<ConversationTurn>,
    capacity: usize,
}

impl RecentHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: Vec::new(),
            capacity,
        }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn get(&self, id: &str) -> Option<&ConversationTurn> {
        self.turns.iter().find(|t| t.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Replace the whole list, keeping at most `capacity`
    pub fn replace(&mut self, mut turns: Vec<ConversationTurn>) {
        turns.truncate(self.capacity);
        self.turns = turns;
    }

    /// Add a turn at the front, dropping the oldest past capacity
    pub fn push_front(&mut self, turn: ConversationTurn) {
        self.turns.insert(0, turn);
        self.turns.truncate(self.capacity);
    }

    /// Remove by id. Absent ids are a no-op.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.turns.len();
        self.turns.retain(|t| t.id != id);
        self.turns.len() != before
    }

    /// Swap in an updated copy of a turn already in the list
    pub fn update(&mut self, turn: ConversationTurn) {
        if let Some(slot) = self.turns.iter_mut().find(|t| t.id == turn.id) {
            *slot = turn;
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

impl Default for RecentHistory {
    fn default() -> Self {
        Self::new(RECENT_LIMIT)
    }
}

/// Recent history for one viewer, mirrored to a [`HistoryStore`]
pub struct HistorySynchronizer {
    store: Arc<dyn HistoryStore>,
    user: Option<String>,
    recent: RecentHistory,
}

impl HistorySynchronizer {
    pub fn new(store: Arc<dyn HistoryStore>, user: Option<String>, capacity: usize) -> Self {
        Self {
            store,
            user,
            recent: RecentHistory::new(capacity),
        }
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn recent(&self) -> &[ConversationTurn] {
        self.recent.turns()
    }

    pub fn find(&self, id: &str) -> Option<&ConversationTurn> {
        self.recent.get(id)
    }

    /// Load the newest turns from the store. Anonymous viewers get nothing.
    pub async fn load_recent(&mut self) {
        let Some(user) = self.user.as_deref() else {
            return;
        };
        let limit = u32::try_from(self.recent.capacity).unwrap_or(u32::MAX);
        match self.store.list_recent(user, limit).await {
            Ok(turns) => {
                tracing::debug!(user = %user, count = turns.len(), "Loaded recent history");
                self.recent.replace(turns);
            }
            Err(e) => {
                tracing::warn!(user = %user, error = %e, "Failed to load recent history");
            }
        }
    }

    /// Persist a completed turn and put it at the front of the list
    pub async fn save_turn(&mut self, prompt: &str, response: &str) -> Option<ConversationTurn> {
        let user = self.user.as_deref()?;
        match self.store.create(user, prompt, response, &[]).await {
            Ok(turn) => {
                tracing::info!(user = %user, turn_id = %turn.id, "Saved conversation turn");
                self.recent.push_front(turn.clone());
                Some(turn)
            }
            Err(e) => {
                tracing::warn!(user = %user, error = %e, "Failed to save conversation turn");
                None
            }
        }
    }

    /// Delete a turn from the store and the list. Ids not in the list are ignored.
    pub async fn delete_turn(&mut self, id: &str) -> bool {
        let Some(user) = self.user.as_deref() else {
            return false;
        };
        if !self.recent.contains(id) {
            return false;
        }
        match self.store.delete(user, id).await {
            Ok(()) => self.recent.remove(id),
            Err(e) => {
                tracing::warn!(user = %user, turn_id = %id, error = %e, "Failed to delete turn");
                false
            }
        }
    }

    /// Flip a turn's favorite flag in the store and the list
    pub async fn toggle_favorite(&mut self, id: &str) -> Option<ConversationTurn> {
        let user = self.user.as_deref()?;
        if !self.recent.contains(id) {
            return None;
        }
        match self.store.toggle_favorite(user, id).await {
            Ok(turn) => {
                self.recent.update(turn.clone());
                Some(turn)
            }
            Err(e) => {
                tracing::warn!(user = %user, turn_id = %id, error = %e, "Failed to toggle favorite");
                None
            }
        }
    }

    /// Forget the user and the list (logout)
    pub fn reset(&mut self) {
        self.user = None;
        self.recent.clear();
    }
}
