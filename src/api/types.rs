//! API request and response types

use crate::db::ConversationTurn;
use crate::llm::ImageAttachment;
use crate::session::SessionSnapshot;
use serde::{Deserialize, Serialize};

/// Request to store a completed turn
#[derive(Debug, Deserialize)]
pub struct SaveTurnRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Query for the paginated history listing
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub favorite: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecentParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RecentResponse {
    pub turns: Vec<ConversationTurn>,
}

#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    pub id: String,
    pub is_favorite: bool,
}

impl From<ConversationTurn> for FavoriteResponse {
    fn from(turn: ConversationTurn) -> Self {
        Self {
            id: turn.id,
            is_favorite: turn.is_favorite,
        }
    }
}

/// Generic success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub authenticated: bool,
}

/// Current view state plus recent history
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub state: SessionSnapshot,
    pub history: Vec<ConversationTurn>,
    pub authenticated: bool,
}

/// Prompt for a conversation view
#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub text: String,
    pub image: Option<ImageAttachment>,
}

#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub queued: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
