//! Database schema and types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS chat_history (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    prompt TEXT NOT NULL,
    response TEXT NOT NULL,
    is_favorite BOOLEAN NOT NULL DEFAULT 0,
    tags TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chat_history_user_created
    ON chat_history(user_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_chat_history_user_favorite
    ON chat_history(user_id, is_favorite);
";

/// A completed prompt/response pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: String,
    pub prompt: String,
    /// Raw model output, formatted again on display
    pub response: String,
    pub created_at: DateTime<Utc>,
    pub is_favorite: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Page request for the history listing. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    pub page: u32,
    pub limit: u32,
    pub favorite_only: bool,
}

impl HistoryQuery {
    pub const DEFAULT_LIMIT: u32 = 20;
    /// Largest page any listing returns
    pub const MAX_LIMIT: u32 = 100;

    /// Clamp page and limit to usable values
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            limit: if self.limit == 0 {
                Self::DEFAULT_LIMIT
            } else {
                self.limit.min(Self::MAX_LIMIT)
            },
            favorite_only: self.favorite_only,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: Self::DEFAULT_LIMIT,
            favorite_only: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u64,
    pub total_docs: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn new(query: &HistoryQuery, total_docs: u64) -> Self {
        let total_pages = total_docs.div_ceil(u64::from(query.limit.max(1)));
        Self {
            current_page: query.page,
            total_pages,
            total_docs,
            has_next_page: u64::from(query.page) < total_pages,
            has_prev_page: query.page > 1,
        }
    }
}

/// One page of history, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryPage {
    pub turns: Vec<ConversationTurn>,
    pub pagination: Pagination,
}
