use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{session::SessionError, storage::StorageError};

/// AppError
///
/// Failures a handler cannot turn into one of its own plain-text answers. Client
/// mistakes keep their message; server-side failures are logged and answered with a
/// generic 500 body.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("file storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("malformed upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Multipart(e) => e.status(),
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Database(_)
            | AppError::Storage(_)
            | AppError::Template(_)
            | AppError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
            return (status, "Internal Server Error").into_response();
        }
        (status, self.to_string()).into_response()
    }
}
