//! HTTP request handlers

use super::auth::AuthUser;
use super::sse::sse_stream;
use super::types::{
    CreateSessionResponse, ErrorResponse, FavoriteResponse, HistoryParams, PromptRequest,
    QueuedResponse, RecentParams, RecentResponse, SaveTurnRequest, SessionResponse,
    SuccessResponse,
};
use super::AppState;
use crate::chat::ChatView;
use crate::db::{ConversationTurn, HistoryPage, HistoryQuery};
use crate::history::PersistenceError;
use crate::llm::ImageAttachment;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use base64::Engine;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

const DEFAULT_RECENT_LIMIT: u32 = 10;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Chat history (JWT required)
        .route("/api/chat/save", post(save_turn))
        .route("/api/chat/history", get(list_history))
        .route("/api/chat/recent", get(list_recent))
        .route("/api/chat/:id/favorite", patch(toggle_favorite))
        .route("/api/chat/:id", delete(delete_turn))
        // Conversation views (JWT optional)
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(close_session))
        .route("/api/sessions/:id/stream", get(stream_session))
        .route("/api/sessions/:id/prompt", post(submit_prompt))
        .route("/api/sessions/:id/new", post(new_conversation))
        .route("/api/sessions/:id/turns/:turn_id/load", post(load_turn))
        .route("/api/sessions/:id/turns/:turn_id", delete(delete_session_turn))
        .route(
            "/api/sessions/:id/turns/:turn_id/favorite",
            post(favorite_session_turn),
        )
        // Version
        .route("/version", get(get_version))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================
// Chat History
// ============================================================

async fn save_turn(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<SaveTurnRequest>,
) -> Result<(StatusCode, Json<ConversationTurn>), AppError> {
    if req.prompt.trim().is_empty() || req.response.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Prompt and response are required".to_string(),
        ));
    }

    let turn = state
        .store
        .create(&user.id, &req.prompt, &req.response, &req.tags)
        .await?;

    tracing::info!(user = %user.id, turn_id = %turn.id, "Chat saved");
    Ok((StatusCode::CREATED, Json(turn)))
}

async fn list_history(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryPage>, AppError> {
    let query = HistoryQuery {
        page: params.page.unwrap_or(1),
        limit: params.limit.unwrap_or(HistoryQuery::DEFAULT_LIMIT),
        favorite_only: params.favorite.unwrap_or(false),
    }
    .normalized();

    Ok(Json(state.store.list_page(&user.id, query).await?))
}

async fn list_recent(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<RecentParams>,
) -> Result<Json<RecentResponse>, AppError> {
    let limit = params.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_RECENT_LIMIT);
    let turns = state.store.list_recent(&user.id, limit).await?;
    Ok(Json(RecentResponse { turns }))
}

async fn toggle_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<FavoriteResponse>, AppError> {
    let turn = state.store.toggle_favorite(&user.id, &id).await?;
    Ok(Json(turn.into()))
}

async fn delete_turn(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.store.delete(&user.id, &id).await?;
    tracing::info!(user = %user.id, turn_id = %id, "Chat deleted");
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Conversation Views
// ============================================================

async fn create_session(
    State(state): State<AppState>,
    user: Option<AuthUser>,
) -> Result<Json<CreateSessionResponse>, AppError> {
    let authenticated = user.is_some();
    let view = state
        .views
        .create(user.map(|u| u.id))
        .await
        .map_err(|e| AppError::Unavailable(e.to_string()))?;
    Ok(Json(CreateSessionResponse {
        session_id: view.id().to_string(),
        authenticated,
    }))
}

async fn find_view(state: &AppState, id: &str) -> Result<Arc<ChatView>, AppError> {
    state
        .views
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {id}")))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let view = find_view(&state, &id).await?;
    let (snapshot, history, authenticated) = view.overview().await;
    Ok(Json(SessionResponse {
        state: snapshot,
        history,
        authenticated,
    }))
}

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let view = find_view(&state, &id).await?;
    let (init_event, broadcast_rx) = view.subscribe().await;
    Ok(sse_stream(view, init_event, broadcast_rx))
}

async fn submit_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PromptRequest>,
) -> Result<(StatusCode, Json<QueuedResponse>), AppError> {
    if req.text.trim().is_empty() {
        return Err(AppError::BadRequest("Prompt text is required".to_string()));
    }
    if let Some(image) = &req.image {
        validate_image(image)?;
    }

    let view = find_view(&state, &id).await?;
    tokio::spawn(async move {
        view.submit_prompt(req.text, req.image).await;
    });

    Ok((StatusCode::ACCEPTED, Json(QueuedResponse { queued: true })))
}

fn validate_image(image: &ImageAttachment) -> Result<(), AppError> {
    if !image.media_type.starts_with("image/") {
        return Err(AppError::BadRequest(format!(
            "Unsupported attachment type: {}",
            image.media_type
        )));
    }
    base64::engine::general_purpose::STANDARD
        .decode(&image.data)
        .map_err(|e| AppError::BadRequest(format!("Image data is not valid base64: {e}")))?;
    Ok(())
}

async fn new_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    find_view(&state, &id).await?.start_new_conversation().await;
    Ok(Json(SuccessResponse { success: true }))
}

async fn load_turn(
    State(state): State<AppState>,
    Path((id, turn_id)): Path<(String, String)>,
) -> Result<Json<SuccessResponse>, AppError> {
    let view = find_view(&state, &id).await?;
    if !view.load_turn(&turn_id).await {
        return Err(AppError::NotFound(format!("Turn not found: {turn_id}")));
    }
    Ok(Json(SuccessResponse { success: true }))
}

async fn delete_session_turn(
    State(state): State<AppState>,
    Path((id, turn_id)): Path<(String, String)>,
) -> Result<Json<SuccessResponse>, AppError> {
    let deleted = find_view(&state, &id).await?.delete_turn(&turn_id).await;
    Ok(Json(SuccessResponse { success: deleted }))
}

async fn favorite_session_turn(
    State(state): State<AppState>,
    Path((id, turn_id)): Path<(String, String)>,
) -> Result<Json<FavoriteResponse>, AppError> {
    let view = find_view(&state, &id).await?;
    let turn = view
        .toggle_favorite(&turn_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Turn not found: {turn_id}")))?;
    Ok(Json(turn.into()))
}

async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state.views.remove(&id).await {
        return Err(AppError::NotFound(format!("Session not found: {id}")));
    }
    Ok(Json(SuccessResponse { success: true }))
}

async fn get_version() -> &'static str {
    concat!("astra-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Unavailable(String),
    Internal(String),
}

impl From<PersistenceError> for AppError {
    fn from(e: PersistenceError) -> Self {
        match e {
            PersistenceError::NotFound(_) => AppError::NotFound("Chat not found".to_string()),
            PersistenceError::Database(e) => {
                tracing::error!(error = %e, "History store failed");
                AppError::Internal(e.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
