use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod session;
pub mod storage;
pub mod views;

// Routes grouped by audience (public, teacher, student).
pub mod routes;
use routes::{public, student, teacher};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{PostgresRepository, RepositoryState};
pub use session::{MemorySessionStore, SessionManager};
pub use storage::{FileStoreState, LocalFileStore};
pub use views::Views;

/// ApiDoc
///
/// Generated OpenAPI description of every route, served at `/api-docs/openapi.json`
/// and browsable under `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::home, handlers::login_form, handlers::login, handlers::logout,
        handlers::dashboard, handlers::upload_note_form, handlers::upload_note,
        handlers::view_notes, handlers::serve_note, handlers::upload_video_form,
        handlers::upload_video, handlers::view_videos, handlers::serve_video,
        handlers::create_quiz_form, handlers::create_quiz, handlers::take_quiz_form,
        handlers::take_quiz, handlers::view_grades, handlers::view_courses,
        handlers::enroll, handlers::my_courses
    ),
    components(
        schemas(
            models::Role, models::Note, models::Video, models::Question, models::GradeSummary,
            models::Course, models::LoginForm, models::NewQuestion, models::NoteUpload,
            models::VideoUpload,
        )
    ),
    tags(
        (name = "lms-portal", description = "Learning portal: notes, videos, quizzes and enrollment")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, cheaply clonable container of every service a handler may need.
#[derive(Clone)]
pub struct AppState {
    /// Persistence (users, notes, videos, questions, attempts, courses).
    pub repo: RepositoryState,
    /// Uploaded file bytes.
    pub files: FileStoreState,
    /// Server-side sessions and the signed cookie pointing at them.
    pub sessions: SessionManager,
    /// Page templates.
    pub views: Views,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for FileStoreState {
    fn from_ref(app_state: &AppState) -> FileStoreState {
        app_state.files.clone()
    }
}

impl FromRef<AppState> for SessionManager {
    fn from_ref(app_state: &AppState) -> SessionManager {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing structure, puts the access check in front of every
/// application route and adds the request-id and tracing layers.
pub fn create_router(state: AppState) -> Router {
    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 1. Application routes, every one of them behind the access table.
    let app_routes = Router::new()
        .merge(public::public_routes())
        .merge(teacher::teacher_routes(state.config.max_upload_bytes))
        .merge(student::student_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            access::authorize,
        ));

    // 2. Documentation next to them, outside the access check.
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(app_routes)
        .with_state(state);

    // 3. Observability and correlation layers (outermost).
    base_router.layer(
        ServiceBuilder::new()
            // 3a. A UUID for every incoming request.
            .layer(SetRequestIdLayer::new(
                x_request_id.clone(),
                MakeRequestUuid,
            ))
            // 3b. One span per request, tagged with the request id.
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            // 3c. Echo the request id back to the client.
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    )
}

/// trace_span_logger
///
/// Builds the per-request span from the method, uri and `x-request-id` header so every
/// log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
