//! Router setup and shared state for the proxy.
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::api::handlers;
use crate::service::GenerationService;

pub struct AppState {
    pub service: GenerationService,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/generate", get(handlers::generate))
        .route("/batch", post(handlers::batch))
        .route("/info", get(handlers::info))
        .route("/reload", post(handlers::reload))
        .route("/stats", get(handlers::stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
