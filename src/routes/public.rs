use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints reachable without a session. The dashboard sits here too because it only
/// needs *some* session, which the access table checks.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check, returns "ok".
        .route("/health", get(|| async { "ok" }))
        .route("/", get(handlers::home))
        // GET renders the form, POST verifies credentials and starts a session.
        .route("/login", get(handlers::login_form).post(handlers::login))
        .route("/logout", get(handlers::logout))
        // Any session, either role.
        .route("/dashboard", get(handlers::dashboard))
        // Stored files are served without a session check, like the upload folders
        // they come from.
        .route("/uploads/{filename}", get(handlers::serve_note))
        .route("/videos/{filename}", get(handlers::serve_video))
}
