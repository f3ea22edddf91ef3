//! Multi-session server
//!
//! WebSocket endpoints carry the conversation; a small JSON API exposes
//! session transcripts and the standalone recommenders.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use eyre::{Context, Result};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::recommend::Recommender;
use crate::session::SessionRegistry;

mod routes;
mod ws;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub recommender: Arc<Recommender>,
}

impl AppState {
    pub fn new(registry: SessionRegistry, recommender: Recommender) -> Self {
        Self {
            registry: Arc::new(registry),
            recommender: Arc::new(recommender),
        }
    }
}

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .nest("/api", routes::api_router())
        .route("/ws", get(ws::new_session))
        .route("/ws/{session_id}", get(ws::existing_session))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .context(format!("Invalid bind address {}:{}", bind, port))?;
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind {}", addr))?;
    axum::serve(listener, router(state)).await.context("Server error")?;
    Ok(())
}
