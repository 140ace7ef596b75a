//! HTTP API for Astra Chat
//!
//! Chat history REST routes for signed-in users, and conversation views
//! that stream formatted, progressively revealed answers over SSE.

mod auth;
mod handlers;
mod sse;
mod types;

pub use auth::JwtKeys;
pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::chat::ViewRegistry;
use crate::history::HistoryStore;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub views: Arc<ViewRegistry>,
    pub store: Arc<dyn HistoryStore>,
    /// Unset when no secret is configured; authenticated routes then answer 401
    pub jwt: Option<Arc<JwtKeys>>,
}

impl AppState {
    pub fn new(views: Arc<ViewRegistry>, jwt: Option<JwtKeys>) -> Self {
        Self {
            store: views.store().clone(),
            views,
            jwt: jwt.map(Arc::new),
        }
    }
}
