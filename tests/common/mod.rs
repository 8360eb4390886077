#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use chrono::Utc;
use lms_portal::{
    AppConfig, AppState, LocalFileStore, MemorySessionStore, SessionManager, Views,
    auth::{self, SessionUser},
    create_router,
    models::{
        Course, GradeSummary, NewAttempt, NewQuestion, NewUser, Note, Question, Role, User, Video,
    },
    repository::{RepoResult, Repository},
    storage::Folder,
};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::PathBuf,
    sync::{Arc, LazyLock, Mutex},
};
use uuid::Uuid;
use tower::ServiceExt;

pub const STUDENT_ID: i64 = 1;
pub const TEACHER_ID: i64 = 2;
pub const STUDENT_EMAIL: &str = "student@example.com";
pub const STUDENT_PHONE: &str = "1234567890";
pub const TEACHER_EMAIL: &str = "teacher@example.com";
pub const TEACHER_PHONE: &str = "5550001111";
pub const PASSWORD: &str = "@12345";

// Argon2 is slow in debug builds; hash once per test binary.
static PASSWORD_HASH: LazyLock<String> =
    LazyLock::new(|| auth::hash_password(PASSWORD).expect("hash test password"));

// --- IN-MEMORY REPOSITORY ---

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    notes: Vec<Note>,
    videos: Vec<Video>,
    questions: Vec<Question>,
    attempts: Vec<NewAttempt>,
    courses: Vec<Course>,
    // (student_id, course_id), unique like the table's primary key.
    enrollments: BTreeSet<(i64, i64)>,
}

/// A `Repository` over plain vectors. Behaves like the Postgres schema where the
/// handlers depend on it: unique enrollment pairs, unknown courses rejected.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
}

impl InMemoryRepository {
    /// One student and one teacher (both with password `PASSWORD`) and two courses.
    pub fn seeded() -> Self {
        let repo = Self::default();
        {
            let mut tables = repo.tables.lock().unwrap();
            tables.users.push(User {
                id: STUDENT_ID,
                email: STUDENT_EMAIL.to_string(),
                phone: STUDENT_PHONE.to_string(),
                password_hash: PASSWORD_HASH.clone(),
                role: "student".to_string(),
            });
            tables.users.push(User {
                id: TEACHER_ID,
                email: TEACHER_EMAIL.to_string(),
                phone: TEACHER_PHONE.to_string(),
                password_hash: PASSWORD_HASH.clone(),
                role: "teacher".to_string(),
            });
            tables.courses.push(Course {
                id: 1,
                title: "Rust 101".to_string(),
                description: "Ownership and borrowing".to_string(),
            });
            tables.courses.push(Course {
                id: 2,
                title: "Databases".to_string(),
                description: String::new(),
            });
        }
        repo
    }

    pub fn add_question(&self, text: &str, correct_option: &str) -> i64 {
        let mut tables = self.tables.lock().unwrap();
        let id = tables.questions.len() as i64 + 1;
        tables.questions.push(Question {
            id,
            question_text: text.to_string(),
            option_a: "first".to_string(),
            option_b: "second".to_string(),
            option_c: "third".to_string(),
            option_d: "fourth".to_string(),
            correct_option: correct_option.to_string(),
            created_by: TEACHER_ID,
            created_at: Utc::now(),
        });
        id
    }

    pub fn note_count(&self) -> usize {
        self.tables.lock().unwrap().notes.len()
    }

    pub fn video_count(&self) -> usize {
        self.tables.lock().unwrap().videos.len()
    }

    pub fn notes(&self) -> Vec<Note> {
        self.tables.lock().unwrap().notes.clone()
    }

    pub fn questions(&self) -> Vec<Question> {
        self.tables.lock().unwrap().questions.clone()
    }

    pub fn attempts(&self) -> Vec<NewAttempt> {
        self.tables.lock().unwrap().attempts.clone()
    }

    pub fn enrollment_count(&self, student_id: i64, course_id: i64) -> usize {
        self.tables
            .lock()
            .unwrap()
            .enrollments
            .iter()
            .filter(|pair| **pair == (student_id, course_id))
            .count()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_phone(&self, phone: &str) -> RepoResult<Option<User>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.phone == phone).cloned())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut tables = self.tables.lock().unwrap();
        let stored = User {
            id: tables.users.len() as i64 + 1,
            email: user.email,
            phone: user.phone,
            password_hash: user.password_hash,
            role: user.role.to_string(),
        };
        tables.users.push(stored.clone());
        Ok(stored)
    }

    async fn create_note(&self, course_title: &str, filename: &str, uploaded_by: i64) -> RepoResult<Note> {
        let mut tables = self.tables.lock().unwrap();
        let note = Note {
            id: tables.notes.len() as i64 + 1,
            course_title: course_title.to_string(),
            filename: filename.to_string(),
            uploaded_by,
            uploaded_at: Utc::now(),
        };
        tables.notes.push(note.clone());
        Ok(note)
    }

    async fn list_notes(&self) -> RepoResult<Vec<Note>> {
        Ok(self.tables.lock().unwrap().notes.clone())
    }

    async fn create_video(&self, title: &str, filename: &str, uploaded_by: i64) -> RepoResult<Video> {
        let mut tables = self.tables.lock().unwrap();
        let video = Video {
            id: tables.videos.len() as i64 + 1,
            title: title.to_string(),
            filename: filename.to_string(),
            uploaded_by,
            uploaded_at: Utc::now(),
        };
        tables.videos.push(video.clone());
        Ok(video)
    }

    async fn list_videos(&self) -> RepoResult<Vec<Video>> {
        Ok(self.tables.lock().unwrap().videos.clone())
    }

    async fn create_question(&self, question: NewQuestion, created_by: i64) -> RepoResult<Question> {
        let mut tables = self.tables.lock().unwrap();
        let stored = Question {
            id: tables.questions.len() as i64 + 1,
            question_text: question.question,
            option_a: question.option_a,
            option_b: question.option_b,
            option_c: question.option_c,
            option_d: question.option_d,
            correct_option: question.correct_option,
            created_by,
            created_at: Utc::now(),
        };
        tables.questions.push(stored.clone());
        Ok(stored)
    }

    async fn list_questions(&self) -> RepoResult<Vec<Question>> {
        Ok(self.tables.lock().unwrap().questions.clone())
    }

    async fn record_attempt(&self, attempt: NewAttempt) -> RepoResult<()> {
        self.tables.lock().unwrap().attempts.push(attempt);
        Ok(())
    }

    async fn grade_summaries(&self, student_id: i64) -> RepoResult<Vec<GradeSummary>> {
        let tables = self.tables.lock().unwrap();
        let mut grouped: BTreeMap<_, GradeSummary> = BTreeMap::new();
        for attempt in tables.attempts.iter().filter(|a| a.student_id == student_id) {
            let summary = grouped
                .entry(attempt.submitted_at)
                .or_insert_with(|| GradeSummary {
                    submitted_at: attempt.submitted_at,
                    total: 0,
                    correct: 0,
                });
            summary.total += 1;
            if attempt.is_correct {
                summary.correct += 1;
            }
        }
        Ok(grouped.into_values().rev().collect())
    }

    async fn list_courses(&self) -> RepoResult<Vec<Course>> {
        Ok(self.tables.lock().unwrap().courses.clone())
    }

    async fn enrolled_course_ids(&self, student_id: i64) -> RepoResult<Vec<i64>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .enrollments
            .iter()
            .filter(|(student, _)| *student == student_id)
            .map(|(_, course)| *course)
            .collect())
    }

    async fn enroll(&self, student_id: i64, course_id: i64) -> RepoResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.courses.iter().any(|c| c.id == course_id) {
            return Ok(false);
        }
        Ok(tables.enrollments.insert((student_id, course_id)))
    }

    async fn enrolled_courses(&self, student_id: i64) -> RepoResult<Vec<Course>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .courses
            .iter()
            .filter(|c| tables.enrollments.contains(&(student_id, c.id)))
            .cloned()
            .collect())
    }
}

// --- STATE & ROUTER UTILITIES ---

/// Temporary upload root, deleted when the test ends.
pub struct ScratchDir(pub PathBuf);

impl ScratchDir {
    fn new() -> Self {
        Self(std::env::temp_dir().join(format!("lms-test-{}", Uuid::new_v4())))
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

/// Handles kept by a test to inspect side effects after driving the app.
pub struct TestContext {
    pub repo: Arc<InMemoryRepository>,
    pub sessions: Arc<MemorySessionStore>,
    pub state: AppState,
    pub scratch: ScratchDir,
}

/// App state over the in-memory repository, with both upload folders in a fresh
/// scratch directory.
pub fn test_context() -> TestContext {
    let ctx = test_context_without_folders();
    for folder in [Folder::Notes, Folder::Videos] {
        std::fs::create_dir_all(ctx.state.config.folder(folder)).expect("create upload folder");
    }
    ctx
}

/// Like [`test_context`] but the upload folders are never created, so every file
/// write fails.
pub fn test_context_without_folders() -> TestContext {
    let repo = Arc::new(InMemoryRepository::seeded());
    let sessions = Arc::new(MemorySessionStore::new());
    let scratch = ScratchDir::new();
    let config = AppConfig {
        upload_folder: scratch.0.join("uploads"),
        video_folder: scratch.0.join("video_uploads"),
        ..AppConfig::default()
    };

    let state = AppState {
        repo: repo.clone(),
        files: Arc::new(LocalFileStore::from_config(&config)),
        sessions: SessionManager::from_config(&config, sessions.clone()),
        views: Views::new().expect("templates compile"),
        config,
    };

    TestContext {
        repo,
        sessions,
        state,
        scratch,
    }
}

impl TestContext {
    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Bytes stored under `filename`, if the file exists.
    pub fn stored(&self, folder: Folder, filename: &str) -> Option<Vec<u8>> {
        std::fs::read(self.state.config.folder(folder).join(filename)).ok()
    }

    /// Puts a file straight into an upload folder.
    pub fn place(&self, folder: Folder, filename: &str, data: &[u8]) {
        std::fs::write(self.state.config.folder(folder).join(filename), data)
            .expect("write upload fixture");
    }

    /// Number of files across both upload folders.
    pub fn stored_count(&self) -> usize {
        [Folder::Notes, Folder::Videos]
            .into_iter()
            .filter_map(|folder| std::fs::read_dir(self.state.config.folder(folder)).ok())
            .map(|entries| entries.count())
            .sum()
    }

    /// Logs in through `POST /login` and returns the `Cookie` header value to send back.
    pub async fn login(&self, identifier: &str) -> String {
        let response = send(
            self.router(),
            form_request("/login", &format!("identifier={identifier}&password={PASSWORD}"), None),
        )
        .await;
        session_cookie(&response).expect("login sets a session cookie")
    }
}

pub fn student_user() -> SessionUser {
    SessionUser {
        id: STUDENT_ID,
        role: Role::Student,
        email: STUDENT_EMAIL.to_string(),
    }
}

pub fn teacher_user() -> SessionUser {
    SessionUser {
        id: TEACHER_ID,
        role: Role::Teacher,
        email: TEACHER_EMAIL.to_string(),
    }
}

pub async fn send(router: Router, request: Request<Body>) -> Response<Body> {
    router.oneshot(request).await.expect("router is infallible")
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn form_request(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder =
        Request::post(uri).header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub const BOUNDARY: &str = "lms-test-boundary";

/// One field of a multipart body.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    /// Field name, client filename, contents.
    File(&'a str, &'a str, &'a [u8]),
}

/// A multipart body with one text field followed by one file field.
pub fn multipart_request(
    uri: &str,
    cookie: Option<&str>,
    (title_field, title): (&str, &str),
    (file_field, filename, data): (&str, &str, &[u8]),
) -> Request<Body> {
    multipart_parts(
        uri,
        cookie,
        &[Part::Text(title_field, title), Part::File(file_field, filename, data)],
    )
}

/// A multipart body with the given fields, in order.
pub fn multipart_parts(uri: &str, cookie: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        match part {
            Part::Text(name, value) => body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            ),
            Part::File(name, filename, data) => {
                body.extend_from_slice(
                    format!(
                        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::post(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

/// `name=value` of the session cookie set by a response, if any.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("lms_session="))
        .and_then(|value| value.split(';').next())
        .filter(|pair| pair.len() > "lms_session=".len())
        .map(str::to_string)
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
