use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use thiserror::Error;
use utoipa::ToSchema;

// --- Roles ---

/// Role
///
/// The RBAC field stored in `users.role`. Every gated route requires one of these
/// (or merely any session, see `access::Access`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A row of the `users` table. `role` is kept as the raw column text and parsed
/// into a [`Role`] when a session is established.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub phone: String,
    // Argon2id PHC string.
    pub password_hash: String,
    pub role: String,
}

/// Input for inserting a user (used by the `create_user` tool).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: Role,
}

/// Note
///
/// A PDF uploaded by a teacher. `filename` is the sanitized name under the notes folder.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Note {
    pub id: i64,
    pub course_title: String,
    pub filename: String,
    pub uploaded_by: i64,
    pub uploaded_at: DateTime<Utc>,
}

/// Video
///
/// Same lifecycle as [`Note`], stored under the video folder.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Video {
    pub id: i64,
    pub title: String,
    pub filename: String,
    pub uploaded_by: i64,
    pub uploaded_at: DateTime<Utc>,
}

/// Question
///
/// A multiple-choice question with four options. `correct_option` holds whatever
/// label the teacher submitted and is compared verbatim when grading.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Question {
    pub id: i64,
    pub question_text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_option: String,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

/// Input for one attempt row. All rows of a submission share `submitted_at`.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub student_id: i64,
    pub question_id: i64,
    pub chosen_option: Option<String>,
    pub is_correct: bool,
    pub submitted_at: DateTime<Utc>,
}

/// GradeSummary
///
/// Attempts of one student aggregated per submission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct GradeSummary {
    pub submitted_at: DateTime<Utc>,
    pub total: i64,
    pub correct: i64,
}

/// Course
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow, Default)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub description: String,
}

/// A catalog row as shown on `/view_courses`.
#[derive(Debug, Clone, Serialize)]
pub struct CourseListing {
    #[serde(flatten)]
    pub course: Course,
    pub enrolled: bool,
}

// --- Request Payloads (Input Schemas) ---

/// LoginForm
///
/// `identifier` is either an email address or a phone number.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginForm {
    #[schema(example = "student@example.com")]
    pub identifier: String,
    pub password: String,
}

/// NewQuestion
///
/// Form payload of `POST /create_quiz`. Stored verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct NewQuestion {
    pub question: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    #[schema(example = "A")]
    pub correct_option: String,
}

/// Multipart payload of `POST /upload_note` (documentation only).
#[derive(Debug, ToSchema)]
pub struct NoteUpload {
    pub course_title: String,
    #[schema(value_type = String, format = Binary)]
    pub note_file: Vec<u8>,
}

/// Multipart payload of `POST /upload_video` (documentation only).
#[derive(Debug, ToSchema)]
pub struct VideoUpload {
    pub title: String,
    #[schema(value_type = String, format = Binary)]
    pub video_file: Vec<u8>,
}
