use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
    response::Redirect,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::LazyLock};
use thiserror::Error;
use uuid::Uuid;

use crate::{models::Role, repository::Repository};

/// Claims
///
/// Payload of the signed session cookie. The subject is the id of a server-side
/// session record, never the user itself.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the session id.
    pub sub: Uuid,
    /// Expiration Time (exp): matches the session record's expiry.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// SessionUser
///
/// The resolved identity of an authenticated request, as stored in the session:
/// user id, role and email.
///
/// The `access::authorize` middleware resolves it once per request and attaches it to
/// the request extensions; handlers receive it as an argument. Using it as an extractor
/// on a route where no session was attached redirects to the home page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,
    pub role: Role,
    pub email: String,
}

impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionUser>()
            .cloned()
            .ok_or_else(|| Redirect::to("/"))
    }
}

impl<S> OptionalFromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<SessionUser>().cloned())
    }
}

// --- Credentials ---

/// Generic login failure text. Unknown identifiers and wrong passwords are not told apart.
pub const INVALID_CREDENTIALS: &str = "❌ Invalid email/phone or password. Try again.";

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@]+@[^@]+\.[^@]+").unwrap_or_else(|e| panic!("email pattern: {e}"))
});

/// Identifier
///
/// A login identifier classified by shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identifier<'a> {
    Email(&'a str),
    Phone(&'a str),
}

impl<'a> Identifier<'a> {
    /// Anything matching `x@y.z` at its start is an email; everything else is a phone number.
    pub fn classify(raw: &'a str) -> Self {
        if EMAIL_PATTERN.is_match(raw) {
            Identifier::Email(raw)
        } else {
            Identifier::Phone(raw)
        }
    }
}

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hashing(String),
}

/// Verified against when no user matches the identifier, so an unknown identifier
/// costs the same Argon2 work as a wrong password. Uses the default parameters.
const UNKNOWN_USER_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$bm8tc3VjaC11c2Vy$hRBEUxHf+sj3PQ3ZcXSaxuHmjXq6c7tVk4XGvu1XtGw";

/// Hashes a password with Argon2id into a PHC string.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}

/// Verifies a password against a stored PHC string. An unparseable hash never verifies.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("stored password hash is not a valid PHC string: {e}");
            false
        }
    }
}

/// authenticate
///
/// Looks the user up by email or phone and checks the password. Returns the session
/// identity on success and `None` for any credential failure; only database errors
/// surface as `Err`.
pub async fn authenticate(
    repo: &dyn Repository,
    identifier: &str,
    password: &str,
) -> Result<Option<SessionUser>, sqlx::Error> {
    let user = match Identifier::classify(identifier) {
        Identifier::Email(email) => repo.find_user_by_email(email).await?,
        Identifier::Phone(phone) => repo.find_user_by_phone(phone).await?,
    };

    let Some(user) = user else {
        verify_password(password, UNKNOWN_USER_HASH);
        return Ok(None);
    };

    if !verify_password(password, &user.password_hash) {
        return Ok(None);
    }

    match user.role.parse::<Role>() {
        Ok(role) => Ok(Some(SessionUser {
            id: user.id,
            role,
            email: user.email,
        })),
        Err(e) => {
            tracing::warn!(user_id = user.id, "refusing login: {e}");
            Ok(None)
        }
    }
}
