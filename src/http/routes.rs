use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session lifecycle
        .route("/voice-notes/sessions", post(handlers::create_session))
        .route(
            "/voice-notes/sessions/:session_id",
            get(handlers::get_session).delete(handlers::close_session),
        )
        // Recording control
        .route(
            "/voice-notes/sessions/:session_id/start",
            post(handlers::start_recording),
        )
        .route(
            "/voice-notes/sessions/:session_id/stop",
            post(handlers::stop_recording),
        )
        .route(
            "/voice-notes/sessions/:session_id/rerecord",
            post(handlers::re_record),
        )
        .route(
            "/voice-notes/sessions/:session_id/reset",
            post(handlers::reset_session),
        )
        // Captured note playback
        .route(
            "/voice-notes/previews/:preview_id",
            get(handlers::get_preview),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
