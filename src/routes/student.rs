use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Student Router Module
pub fn student_routes() -> Router<AppState> {
    Router::new()
        .route("/view_notes", get(handlers::view_notes))
        .route("/view_videos", get(handlers::view_videos))
        // GET lists the questions, POST grades a submission.
        .route(
            "/take_quiz",
            get(handlers::take_quiz_form).post(handlers::take_quiz),
        )
        .route("/view_grades", get(handlers::view_grades))
        .route("/view_courses", get(handlers::view_courses))
        // Redirects back to the catalog; enrolling twice is a no-op.
        .route("/enroll/{course_id}", post(handlers::enroll))
        .route("/my_courses", get(handlers::my_courses))
}
