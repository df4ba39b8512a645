//! Route definitions for the API server

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Creates the main application router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    // The dashboard may be served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Sales data
        .route("/sales", get(handlers::list_sales))
        // Price optimisation
        .route("/prices", get(handlers::get_prices))
        .route("/prices/export", get(handlers::export_prices))
        // Basket rules
        .route("/rules", get(handlers::get_rules))
        // Assistant
        .route("/assistant/models", get(handlers::list_models))
        .route("/assistant/sessions", post(handlers::create_chat_session))
        .route("/assistant/sessions/:session_id", get(handlers::get_chat_session))
        .route(
            "/assistant/sessions/:session_id/messages",
            post(handlers::post_chat_message),
        )
        // Add middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // Add shared state
        .with_state(state)
}
