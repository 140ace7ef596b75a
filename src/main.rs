//! Astra Chat - web AI chat assistant backend
//!
//! Formats model answers into structured segments, reveals them
//! progressively over SSE, and keeps per-user chat history.

mod api;
mod chat;
mod config;
mod db;
mod format;
mod history;
mod llm;
mod reveal;
mod session;
#[cfg(test)]
mod testing;

use api::{create_router, AppState, JwtKeys};
use chat::ViewRegistry;
use config::ServerConfig;
use db::Database;
use history::DatabaseHistory;
use llm::LlmConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "astra_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = ServerConfig::from_env()?;

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    let model = LlmConfig::from_env().build_client()?;
    tracing::info!(model = %model.model_id(), "Model client initialized");

    let jwt = config.jwt_secret.as_deref().map(|s| JwtKeys::new(s.as_bytes()));
    if jwt.is_none() {
        tracing::warn!("ASTRA_JWT_SECRET is not set; chat history routes will reject all requests");
    }

    let views = Arc::new(ViewRegistry::new(
        model,
        Arc::new(DatabaseHistory::new(db)),
        config.chat,
    ));
    let _sweeper = views.spawn_idle_sweeper();
    let state = AppState::new(views, jwt);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let mut app = create_router(state);
    if let Some(dir) = &config.static_dir {
        tracing::info!(path = %dir.display(), "Serving static files");
        let index = ServeFile::new(dir.join("index.html"));
        app = app.fallback_service(ServeDir::new(dir).not_found_service(index));
    }
    let app = app.layer(cors).layer(compression);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Astra Chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
