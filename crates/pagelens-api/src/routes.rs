//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::handlers::{documents, health, search};
use crate::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create API v1 routes
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/search", post(search::search_handler))
        .route("/chat", post(search::chat_handler))
        .route("/documents/:name", delete(documents::delete_document))
        .route("/stats", get(documents::stats))
}

/// Create the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
