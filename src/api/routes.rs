//! Route Definitions

use super::handlers::*;
use axum::{routing::get, Router};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // Provider calls: query string for everything, JSON body for batches
        .route("/groove", get(provider_get_handler).post(provider_post_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
