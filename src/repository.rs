use crate::models::{
    Course, GradeSummary, NewAttempt, NewQuestion, NewUser, Note, Question, User, Video,
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

/// Result type of every persistence operation.
pub type RepoResult<T> = Result<T, sqlx::Error>;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, so handlers can run
/// against Postgres in production and an in-memory implementation in tests.
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// shareable across Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    async fn find_user_by_phone(&self, phone: &str) -> RepoResult<Option<User>>;
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;

    // --- Notes & Videos ---
    async fn create_note(&self, course_title: &str, filename: &str, uploaded_by: i64)
    -> RepoResult<Note>;
    async fn list_notes(&self) -> RepoResult<Vec<Note>>;
    async fn create_video(&self, title: &str, filename: &str, uploaded_by: i64)
    -> RepoResult<Video>;
    async fn list_videos(&self) -> RepoResult<Vec<Video>>;

    // --- Quiz ---
    async fn create_question(&self, question: NewQuestion, created_by: i64)
    -> RepoResult<Question>;
    async fn list_questions(&self) -> RepoResult<Vec<Question>>;
    // One statement per call; callers do not wrap submissions in a transaction.
    async fn record_attempt(&self, attempt: NewAttempt) -> RepoResult<()>;
    async fn grade_summaries(&self, student_id: i64) -> RepoResult<Vec<GradeSummary>>;

    // --- Courses & Enrollments ---
    async fn list_courses(&self) -> RepoResult<Vec<Course>>;
    async fn enrolled_course_ids(&self, student_id: i64) -> RepoResult<Vec<i64>>;
    /// Idempotent: returns true if a row was inserted, false if the pair already
    /// existed or the course is unknown.
    async fn enroll(&self, student_id: i64, course_id: i64) -> RepoResult<bool>;
    async fn enrolled_courses(&self, student_id: i64) -> RepoResult<Vec<Course>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL. All statements are bound
/// parameters; nothing user-supplied is spliced into SQL text.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, email, phone, password_hash, role";
const QUESTION_COLUMNS: &str = "id, question_text, option_a, option_b, option_c, option_d, correct_option, created_by, created_at";

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_user_by_phone(&self, phone: &str) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE phone = $1"))
            .bind(phone)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, phone, password_hash, role) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        ))
        .bind(user.email)
        .bind(user.phone)
        .bind(user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
    }

    async fn create_note(
        &self,
        course_title: &str,
        filename: &str,
        uploaded_by: i64,
    ) -> RepoResult<Note> {
        sqlx::query_as::<_, Note>(
            r#"INSERT INTO notes (course_title, filename, uploaded_by) VALUES ($1, $2, $3)
               RETURNING id, course_title, filename, uploaded_by, uploaded_at"#,
        )
        .bind(course_title)
        .bind(filename)
        .bind(uploaded_by)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_notes(&self) -> RepoResult<Vec<Note>> {
        sqlx::query_as::<_, Note>(
            "SELECT id, course_title, filename, uploaded_by, uploaded_at FROM notes ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn create_video(&self, title: &str, filename: &str, uploaded_by: i64) -> RepoResult<Video> {
        sqlx::query_as::<_, Video>(
            r#"INSERT INTO videos (title, filename, uploaded_by) VALUES ($1, $2, $3)
               RETURNING id, title, filename, uploaded_by, uploaded_at"#,
        )
        .bind(title)
        .bind(filename)
        .bind(uploaded_by)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_videos(&self) -> RepoResult<Vec<Video>> {
        sqlx::query_as::<_, Video>(
            "SELECT id, title, filename, uploaded_by, uploaded_at FROM videos ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn create_question(&self, question: NewQuestion, created_by: i64) -> RepoResult<Question> {
        sqlx::query_as::<_, Question>(&format!(
            r#"INSERT INTO questions (question_text, option_a, option_b, option_c, option_d, correct_option, created_by)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING {QUESTION_COLUMNS}"#
        ))
        .bind(question.question)
        .bind(question.option_a)
        .bind(question.option_b)
        .bind(question.option_c)
        .bind(question.option_d)
        .bind(question.correct_option)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_questions(&self) -> RepoResult<Vec<Question>> {
        sqlx::query_as::<_, Question>(&format!("SELECT {QUESTION_COLUMNS} FROM questions ORDER BY id"))
            .fetch_all(&self.pool)
            .await
    }

    async fn record_attempt(&self, attempt: NewAttempt) -> RepoResult<()> {
        sqlx::query(
            r#"INSERT INTO attempts (student_id, question_id, chosen_option, is_correct, submitted_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(attempt.student_id)
        .bind(attempt.question_id)
        .bind(attempt.chosen_option)
        .bind(attempt.is_correct)
        .bind(attempt.submitted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// grade_summaries
    ///
    /// Groups the student's attempts by submission timestamp, newest first.
    async fn grade_summaries(&self, student_id: i64) -> RepoResult<Vec<GradeSummary>> {
        sqlx::query_as::<_, GradeSummary>(
            r#"
            SELECT submitted_at,
                   COUNT(*) AS total,
                   COALESCE(SUM(CASE WHEN is_correct THEN 1 ELSE 0 END), 0)::BIGINT AS correct
            FROM attempts
            WHERE student_id = $1
            GROUP BY submitted_at
            ORDER BY submitted_at DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_courses(&self) -> RepoResult<Vec<Course>> {
        sqlx::query_as::<_, Course>("SELECT id, title, description FROM courses ORDER BY id")
            .fetch_all(&self.pool)
            .await
    }

    async fn enrolled_course_ids(&self, student_id: i64) -> RepoResult<Vec<i64>> {
        sqlx::query_scalar::<_, i64>("SELECT course_id FROM enrollments WHERE student_id = $1")
            .bind(student_id)
            .fetch_all(&self.pool)
            .await
    }

    /// enroll
    ///
    /// The `(student_id, course_id)` primary key rejects duplicates. Integrity violations
    /// (duplicate pair or unknown course) are swallowed so repeated enrolls are no-ops;
    /// any other database failure is returned.
    async fn enroll(&self, student_id: i64, course_id: i64) -> RepoResult<bool> {
        let result = sqlx::query("INSERT INTO enrollments (student_id, course_id) VALUES ($1, $2)")
            .bind(student_id)
            .bind(course_id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(res) => Ok(res.rows_affected() > 0),
            Err(sqlx::Error::Database(db))
                if db.is_unique_violation() || db.is_foreign_key_violation() =>
            {
                tracing::debug!(student_id, course_id, "enrollment ignored: {}", db.message());
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn enrolled_courses(&self, student_id: i64) -> RepoResult<Vec<Course>> {
        sqlx::query_as::<_, Course>(
            r#"
            SELECT c.id, c.title, c.description
            FROM courses c
            JOIN enrollments e ON c.id = e.course_id
            WHERE e.student_id = $1
            ORDER BY c.id
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
    }
}
