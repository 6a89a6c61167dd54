use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// API Routes - REST API consumed by the diagram editor
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // SQL generation
            .route("/generate-sql", post(handlers::api::generate_sql))
            // System status
            .route("/health", get(handlers::api::health_check)),
    )
}
