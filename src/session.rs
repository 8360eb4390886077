use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{auth::Claims, auth::SessionUser, config::AppConfig};

/// Name of the cookie carrying the signed session token.
pub const SESSION_COOKIE: &str = "lms_session";

// One year.
const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to sign session token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// SessionStore
///
/// Server-side session records keyed by session id. Records past their expiry are
/// treated as absent.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, id: Uuid, user: SessionUser, expires_at: DateTime<Utc>);
    async fn get(&self, id: Uuid) -> Option<SessionUser>;
    async fn remove(&self, id: Uuid);
}

pub type SessionStoreState = Arc<dyn SessionStore>;

/// MemorySessionStore
///
/// Process-local store. Sessions do not survive a restart.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, (SessionUser, DateTime<Utc>)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, id: Uuid, user: SessionUser, expires_at: DateTime<Utc>) {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, (_, expiry)| *expiry > now);
        sessions.insert(id, (user, expires_at));
    }

    async fn get(&self, id: Uuid) -> Option<SessionUser> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(&id) {
                Some((user, expiry)) if *expiry > now => return Some(user.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: drop it so it cannot be revived.
        self.sessions.write().await.remove(&id);
        None
    }

    async fn remove(&self, id: Uuid) {
        self.sessions.write().await.remove(&id);
    }
}

/// SessionManager
///
/// Ties the server-side store to the browser: the cookie holds an HS256 token signed
/// with `SECRET_KEY` whose subject is the session id. A forged or expired token,
/// or a token whose record was removed at logout, resolves to no session.
#[derive(Clone)]
pub struct SessionManager {
    store: SessionStoreState,
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: TimeDelta,
    secure_cookie: bool,
}

impl SessionManager {
    pub fn new(store: SessionStoreState, secret: &str, ttl_minutes: i64, secure_cookie: bool) -> Self {
        Self {
            store,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: TimeDelta::minutes(ttl_minutes.clamp(1, MAX_TTL_MINUTES)),
            secure_cookie,
        }
    }

    pub fn from_config(config: &AppConfig, store: SessionStoreState) -> Self {
        Self::new(
            store,
            &config.secret_key,
            config.session_ttl_minutes,
            config.secure_cookies(),
        )
    }

    /// start
    ///
    /// Creates a session for `user` and adds its cookie to the jar. Any session the
    /// jar already pointed at is discarded first.
    pub async fn start(&self, jar: CookieJar, user: SessionUser) -> Result<CookieJar, SessionError> {
        if let Some(previous) = self.session_id(&jar) {
            self.store.remove(previous).await;
        }

        let id = Uuid::new_v4();
        let issued_at = Utc::now();
        let expires_at = issued_at + self.ttl;
        let claims = Claims {
            sub: id,
            iat: issued_at.timestamp().max(0) as usize,
            exp: expires_at.timestamp().max(0) as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;

        tracing::info!(user_id = user.id, role = %user.role, "session started");
        self.store.insert(id, user, expires_at).await;

        let cookie = Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookie)
            .build();
        Ok(jar.add(cookie))
    }

    /// The session user the jar's cookie points at, if any.
    pub async fn current(&self, jar: &CookieJar) -> Option<SessionUser> {
        let id = self.session_id(jar)?;
        self.store.get(id).await
    }

    /// end
    ///
    /// Removes the session record (if any) and clears the cookie.
    pub async fn end(&self, jar: CookieJar) -> CookieJar {
        if let Some(id) = self.session_id(&jar) {
            self.store.remove(id).await;
            tracing::info!("session ended");
        }
        jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
    }

    fn session_id(&self, jar: &CookieJar) -> Option<Uuid> {
        let token = jar.get(SESSION_COOKIE)?.value();
        match decode::<Claims>(token, &self.decoding, &Validation::default()) {
            Ok(data) => Some(data.claims.sub),
            Err(e) => {
                tracing::debug!("ignoring session cookie: {e}");
                None
            }
        }
    }
}
