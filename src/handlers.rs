use crate::{
    AppState,
    auth::{self, INVALID_CREDENTIALS, SessionUser},
    error::AppError,
    models::{CourseListing, LoginForm, NewAttempt, NewQuestion, NoteUpload, VideoUpload},
    storage::{self, FileSink, Folder, StorageError},
};
use axum::{
    Form,
    extract::{Multipart, Path, Request, State, multipart::Field},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use std::collections::HashMap;
use tera::Context;
use tokio::io::AsyncWriteExt;
use tower::ServiceExt;
use tower_http::services::ServeFile;

// --- Plain-text answers ---

pub const NOTE_UPLOADED: &str = "✅ Note uploaded successfully!";
pub const NOTE_INVALID_TYPE: &str = "❌ Invalid file type. Only PDFs allowed.";
pub const VIDEO_UPLOADED: &str = "✅ Video uploaded!";
pub const VIDEO_INVALID_TYPE: &str = "❌ Invalid file type.";
pub const QUESTION_ADDED: &str = "✅ Question added successfully!";

/// UploadForm
///
/// Field names, destination and answers of one upload form.
struct UploadForm {
    folder: Folder,
    title_field: &'static str,
    file_field: &'static str,
    uploaded: &'static str,
    invalid_type: &'static str,
}

const NOTE_UPLOAD: UploadForm = UploadForm {
    folder: Folder::Notes,
    title_field: "course_title",
    file_field: "note_file",
    uploaded: NOTE_UPLOADED,
    invalid_type: NOTE_INVALID_TYPE,
};

const VIDEO_UPLOAD: UploadForm = UploadForm {
    folder: Folder::Videos,
    title_field: "title",
    file_field: "video_file",
    uploaded: VIDEO_UPLOADED,
    invalid_type: VIDEO_INVALID_TYPE,
};

// --- Pages ---

/// home
///
/// [Public Route] Landing page.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Home page", body = String, content_type = "text/html"))
)]
pub async fn home(
    user: Option<SessionUser>,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    Ok(state.views.page("home.html", user.as_ref())?)
}

/// login_form
///
/// [Public Route] Renders the login form.
#[utoipa::path(
    get,
    path = "/login",
    responses((status = 200, description = "Login form", body = String, content_type = "text/html"))
)]
pub async fn login_form(
    user: Option<SessionUser>,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    Ok(state.views.page("login.html", user.as_ref())?)
}

/// login
///
/// [Public Route] Verifies the credentials and starts a session.
///
/// *Enumeration*: unknown identifiers and wrong passwords get the same answer.
#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Logged in, redirect to /dashboard"),
        (status = 200, description = "Invalid credentials", body = String, content_type = "text/plain")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    match auth::authenticate(state.repo.as_ref(), &form.identifier, &form.password).await? {
        Some(user) => {
            let jar = state.sessions.start(jar, user).await?;
            Ok((jar, Redirect::to("/dashboard")).into_response())
        }
        None => {
            tracing::info!("login rejected");
            Ok(INVALID_CREDENTIALS.into_response())
        }
    }
}

/// logout
///
/// [Public Route] Drops the session (if any) and returns home.
#[utoipa::path(
    get,
    path = "/logout",
    responses((status = 303, description = "Session cleared, redirect to /"))
)]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    (state.sessions.end(jar).await, Redirect::to("/"))
}

/// dashboard
///
/// [Authenticated Route] Role-specific landing page.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses((status = 200, description = "Dashboard", body = String, content_type = "text/html"))
)]
pub async fn dashboard(
    user: SessionUser,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    Ok(state.views.page("dashboard.html", Some(&user))?)
}

// --- Notes & Videos ---

/// upload_note_form
///
/// [Teacher Route]
#[utoipa::path(
    get,
    path = "/upload_note",
    responses((status = 200, description = "Upload form", body = String, content_type = "text/html"))
)]
pub async fn upload_note_form(
    user: SessionUser,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    Ok(state.views.page("upload_notes.html", Some(&user))?)
}

/// upload_note
///
/// [Teacher Route] Stores a PDF and records it against the course title.
#[utoipa::path(
    post,
    path = "/upload_note",
    request_body(content = NoteUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Success or invalid-type message", body = String, content_type = "text/plain"),
        (status = 400, description = "Missing form field")
    )
)]
pub async fn upload_note(
    user: SessionUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    store_upload(&state, &user, multipart, &NOTE_UPLOAD).await
}

/// view_notes
///
/// [Student Route]
#[utoipa::path(
    get,
    path = "/view_notes",
    responses((status = 200, description = "Notes list", body = String, content_type = "text/html"))
)]
pub async fn view_notes(
    user: SessionUser,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let notes = state.repo.list_notes().await?;
    let mut context = Context::new();
    context.insert("notes", &notes);
    Ok(state.views.render("view_notes.html", Some(&user), context)?)
}

/// serve_note
///
/// [Public Route] A stored note, with conditional and `Range` requests honoured.
#[utoipa::path(
    get,
    path = "/uploads/{filename}",
    params(("filename" = String, Path, description = "Stored file name")),
    responses(
        (status = 200, description = "PDF bytes"),
        (status = 206, description = "Requested byte range"),
        (status = 404, description = "No such file")
    )
)]
pub async fn serve_note(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    serve_file(&state, Folder::Notes, &filename, request).await
}

/// upload_video_form
///
/// [Teacher Route]
#[utoipa::path(
    get,
    path = "/upload_video",
    responses((status = 200, description = "Upload form", body = String, content_type = "text/html"))
)]
pub async fn upload_video_form(
    user: SessionUser,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    Ok(state.views.page("upload_video.html", Some(&user))?)
}

/// upload_video
///
/// [Teacher Route] Same flow as `upload_note` with the video allow-list.
#[utoipa::path(
    post,
    path = "/upload_video",
    request_body(content = VideoUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Success or invalid-type message", body = String, content_type = "text/plain"),
        (status = 400, description = "Missing form field")
    )
)]
pub async fn upload_video(
    user: SessionUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    store_upload(&state, &user, multipart, &VIDEO_UPLOAD).await
}

/// view_videos
///
/// [Student Route]
#[utoipa::path(
    get,
    path = "/view_videos",
    responses((status = 200, description = "Video list", body = String, content_type = "text/html"))
)]
pub async fn view_videos(
    user: SessionUser,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let videos = state.repo.list_videos().await?;
    let mut context = Context::new();
    context.insert("videos", &videos);
    Ok(state.views.render("view_videos.html", Some(&user), context)?)
}

/// serve_video
///
/// [Public Route] A stored video. `Range` support lets players seek.
#[utoipa::path(
    get,
    path = "/videos/{filename}",
    params(("filename" = String, Path, description = "Stored file name")),
    responses(
        (status = 200, description = "Video bytes"),
        (status = 206, description = "Requested byte range"),
        (status = 404, description = "No such file")
    )
)]
pub async fn serve_video(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request: Request,
) -> Result<Response, AppError> {
    serve_file(&state, Folder::Videos, &filename, request).await
}

// --- Quiz ---

/// create_quiz_form
///
/// [Teacher Route]
#[utoipa::path(
    get,
    path = "/create_quiz",
    responses((status = 200, description = "Question form", body = String, content_type = "text/html"))
)]
pub async fn create_quiz_form(
    user: SessionUser,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    Ok(state.views.page("create_quiz.html", Some(&user))?)
}

/// create_quiz
///
/// [Teacher Route] Stores one question verbatim.
#[utoipa::path(
    post,
    path = "/create_quiz",
    request_body(content = NewQuestion, content_type = "application/x-www-form-urlencoded"),
    responses((status = 200, description = "Question stored", body = String, content_type = "text/plain"))
)]
pub async fn create_quiz(
    user: SessionUser,
    State(state): State<AppState>,
    Form(question): Form<NewQuestion>,
) -> Result<&'static str, AppError> {
    let stored = state.repo.create_question(question, user.id).await?;
    tracing::info!(question_id = stored.id, teacher_id = user.id, "question created");
    Ok(QUESTION_ADDED)
}

/// take_quiz_form
///
/// [Student Route] Lists every question with its four options.
#[utoipa::path(
    get,
    path = "/take_quiz",
    responses((status = 200, description = "Quiz form", body = String, content_type = "text/html"))
)]
pub async fn take_quiz_form(
    user: SessionUser,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let questions = state.repo.list_questions().await?;
    let mut context = Context::new();
    context.insert("questions", &questions);
    Ok(state.views.render("take_quiz.html", Some(&user), context)?)
}

/// take_quiz
///
/// [Student Route] Grades a submission. The form maps question ids to the chosen
/// option label; unanswered questions count as wrong.
///
/// One attempt row is written per question, each in its own statement. A failure
/// midway leaves the earlier rows of the submission in place.
#[utoipa::path(
    post,
    path = "/take_quiz",
    responses((status = 200, description = "Score", body = String, content_type = "text/plain"))
)]
pub async fn take_quiz(
    user: SessionUser,
    State(state): State<AppState>,
    Form(answers): Form<HashMap<String, String>>,
) -> Result<String, AppError> {
    let questions = state.repo.list_questions().await?;
    let submitted_at = Utc::now();
    let mut score = 0usize;

    for question in &questions {
        let chosen_option = answers.get(&question.id.to_string()).cloned();
        let is_correct = chosen_option.as_deref() == Some(question.correct_option.as_str());
        if is_correct {
            score += 1;
        }
        state
            .repo
            .record_attempt(NewAttempt {
                student_id: user.id,
                question_id: question.id,
                chosen_option,
                is_correct,
                submitted_at,
            })
            .await?;
    }

    tracing::info!(
        student_id = user.id,
        score,
        total = questions.len(),
        "quiz submitted"
    );
    Ok(format!("Your score: {score} out of {}", questions.len()))
}

/// view_grades
///
/// [Student Route] One row per submission: when, how many correct, out of how many.
#[utoipa::path(
    get,
    path = "/view_grades",
    responses((status = 200, description = "Grades", body = String, content_type = "text/html"))
)]
pub async fn view_grades(
    user: SessionUser,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let attempts = state.repo.grade_summaries(user.id).await?;
    let mut context = Context::new();
    context.insert("attempts", &attempts);
    Ok(state.views.render("view_grades.html", Some(&user), context)?)
}

// --- Courses & Enrollments ---

/// view_courses
///
/// [Student Route] The whole catalog, each course flagged if the student is enrolled.
#[utoipa::path(
    get,
    path = "/view_courses",
    responses((status = 200, description = "Course catalog", body = String, content_type = "text/html"))
)]
pub async fn view_courses(
    user: SessionUser,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let courses = state.repo.list_courses().await?;
    let enrolled = state.repo.enrolled_course_ids(user.id).await?;

    let listings: Vec<CourseListing> = courses
        .into_iter()
        .map(|course| CourseListing {
            enrolled: enrolled.contains(&course.id),
            course,
        })
        .collect();

    let mut context = Context::new();
    context.insert("courses", &listings);
    context.insert("enrolled_courses", &enrolled);
    Ok(state.views.render("view_courses.html", Some(&user), context)?)
}

/// enroll
///
/// [Student Route] Enrolls the student in a course.
///
/// *Idempotency*: enrolling twice (or in an unknown course) is a silent no-op.
#[utoipa::path(
    post,
    path = "/enroll/{course_id}",
    params(("course_id" = i64, Path, description = "Course ID")),
    responses((status = 303, description = "Redirect to /view_courses"))
)]
pub async fn enroll(
    user: SessionUser,
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
) -> Result<Redirect, AppError> {
    let inserted = state.repo.enroll(user.id, course_id).await?;
    tracing::info!(student_id = user.id, course_id, inserted, "enroll");
    Ok(Redirect::to("/view_courses"))
}

/// my_courses
///
/// [Student Route]
#[utoipa::path(
    get,
    path = "/my_courses",
    responses((status = 200, description = "Enrolled courses", body = String, content_type = "text/html"))
)]
pub async fn my_courses(
    user: SessionUser,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let courses = state.repo.enrolled_courses(user.id).await?;
    let mut context = Context::new();
    context.insert("courses", &courses);
    Ok(state.views.render("my_courses.html", Some(&user), context)?)
}

// --- Upload plumbing ---

/// What became of the file field of an upload form.
enum Received {
    /// Streamed to disk under the sanitized name.
    Stored { filename: String, bytes: u64 },
    /// Disallowed extension. The field body was skipped unread.
    Rejected,
}

/// Sanitized name for a client filename, or `None` when the folder's allow-list
/// rejects it before or after sanitizing.
fn accepted_filename(original: &str, folder: Folder) -> Option<String> {
    let allowed = folder.allowed_extensions();
    if !storage::extension_allowed(original, allowed) {
        return None;
    }
    let filename = storage::secure_filename(original);
    storage::extension_allowed(&filename, allowed).then_some(filename)
}

/// store_upload
///
/// Walks the multipart fields in arrival order. The file field's name is checked
/// against the allow-list from its header, so a rejected file is neither read nor
/// written; an accepted one is streamed to the store chunk by chunk. The metadata
/// row is inserted once both fields are in.
async fn store_upload(
    state: &AppState,
    user: &SessionUser,
    mut multipart: Multipart,
    form: &UploadForm,
) -> Result<Response, AppError> {
    let mut title = None;
    let mut received = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(name) if name == form.title_field => title = Some(field.text().await?),
            Some(name) if name == form.file_field => {
                let original = field.file_name().unwrap_or_default().to_owned();
                received = Some(match accepted_filename(&original, form.folder) {
                    Some(filename) => {
                        let bytes = write_field(state, form.folder, &filename, field).await?;
                        Received::Stored { filename, bytes }
                    }
                    None => Received::Rejected,
                });
            }
            // Unknown fields are skipped.
            _ => {}
        }
    }

    let Some(title) = title else {
        if let Some(Received::Stored { filename, .. }) = &received {
            state.files.remove(form.folder, filename).await?;
        }
        return Err(AppError::BadRequest(format!("missing field {}", form.title_field)));
    };

    match received {
        None => Err(AppError::BadRequest(format!("missing field {}", form.file_field))),
        Some(Received::Rejected) => {
            tracing::info!(uploader = user.id, folder = ?form.folder, "upload rejected: file type");
            Ok(form.invalid_type.into_response())
        }
        Some(Received::Stored { filename, bytes }) => {
            match form.folder {
                Folder::Notes => {
                    state.repo.create_note(&title, &filename, user.id).await?;
                }
                Folder::Videos => {
                    state.repo.create_video(&title, &filename, user.id).await?;
                }
            }
            tracing::info!(uploader = user.id, folder = ?form.folder, %filename, bytes, "upload stored");
            Ok(form.uploaded.into_response())
        }
    }
}

/// Streams one file field into the store. A partial file is removed when the body
/// breaks off or exceeds the upload limit.
async fn write_field(
    state: &AppState,
    folder: Folder,
    filename: &str,
    field: Field<'_>,
) -> Result<u64, AppError> {
    let mut sink = state.files.create(folder, filename).await?;
    match copy_chunks(field, &mut sink).await {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            drop(sink);
            if let Err(cleanup) = state.files.remove(folder, filename).await {
                tracing::warn!(%filename, error = %cleanup, "partial upload left behind");
            }
            Err(e)
        }
    }
}

async fn copy_chunks(mut field: Field<'_>, sink: &mut FileSink) -> Result<u64, AppError> {
    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await? {
        sink.write_all(&chunk).await.map_err(StorageError::from)?;
        written += chunk.len() as u64;
    }
    sink.flush().await.map_err(StorageError::from)?;
    Ok(written)
}

/// Hands a stored file to `ServeFile`, which sets the content type from the
/// extension and answers `Range`, `If-Modified-Since` and `HEAD`.
async fn serve_file(
    state: &AppState,
    folder: Folder,
    filename: &str,
    request: Request,
) -> Result<Response, AppError> {
    if !storage::is_safe_filename(filename) {
        return Err(AppError::NotFound);
    }
    let path = state.config.folder(folder).join(filename);
    let response = ServeFile::new(path)
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});
    if response.status() == StatusCode::NOT_FOUND {
        return Err(AppError::NotFound);
    }
    Ok(response.into_response())
}
