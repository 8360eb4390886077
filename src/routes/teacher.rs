use crate::{AppState, handlers};
use axum::{Router, extract::DefaultBodyLimit, routing::get};

/// Teacher Router Module
///
/// Upload and authoring endpoints. Each GET renders the form, each POST stores the
/// submission and answers with a plain-text message.
///
/// `max_upload_bytes` replaces axum's default body limit on the upload routes only.
pub fn teacher_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/upload_note",
            get(handlers::upload_note_form).post(handlers::upload_note),
        )
        .route(
            "/upload_video",
            get(handlers::upload_video_form).post(handlers::upload_video),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .route(
            "/create_quiz",
            get(handlers::create_quiz_form).post(handlers::create_quiz),
        )
}
