use sqlx::postgres::PgConnectOptions;
use std::{
    env,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;

use crate::storage::Folder;

/// Fallback session-signing key used outside production.
pub const LOCAL_SECRET_KEY: &str = "fallbacksecret";

/// AppConfig
///
/// Holds the application's entire configuration. Immutable once loaded and shared
/// through the application state via `FromRef`.
#[derive(Clone)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format, cookie flags and secret handling.
    pub env: Env,
    // Full connection string; takes precedence over the individual DB_* parts.
    pub database_url: Option<String>,
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    // Signs the session cookie.
    pub secret_key: String,
    pub session_ttl_minutes: i64,
    pub upload_folder: PathBuf,
    pub video_folder: PathBuf,
    pub max_upload_bytes: usize,
    pub bind_addr: String,
}

/// Env
///
/// Defines the runtime context: `Local` tolerates insecure defaults, `Production`
/// insists on an explicit secret and marks cookies `Secure`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),
    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

impl Default for AppConfig {
    /// Non-panicking configuration with the local defaults, used by tests.
    fn default() -> Self {
        Self {
            env: Env::Local,
            database_url: None,
            db_host: "localhost".to_string(),
            db_port: 5432,
            db_user: "postgres".to_string(),
            db_password: String::new(),
            db_name: "lms_db".to_string(),
            secret_key: LOCAL_SECRET_KEY.to_string(),
            session_ttl_minutes: 720,
            upload_folder: PathBuf::from("uploads"),
            video_folder: PathBuf::from("video_uploads"),
            max_upload_bytes: 512 * 1024 * 1024,
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables. Every value has a local
    /// default except `SECRET_KEY` in production, whose absence is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let app_env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let secret_key = match (app_env, env::var("SECRET_KEY")) {
            (_, Ok(key)) if !key.is_empty() => key,
            (Env::Production, _) => return Err(ConfigError::Missing("SECRET_KEY")),
            (Env::Local, _) => {
                tracing::warn!("SECRET_KEY not set, using the insecure local fallback");
                defaults.secret_key
            }
        };

        let max_upload_mb: usize = parse_var("MAX_UPLOAD_MB", 512)?;

        Ok(Self {
            env: app_env,
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            db_host: var_or("DB_HOST", defaults.db_host),
            db_port: parse_var("DB_PORT", defaults.db_port)?,
            db_user: var_or("DB_USER", defaults.db_user),
            db_password: var_or("DB_PASSWORD", defaults.db_password),
            db_name: var_or("DB_NAME", defaults.db_name),
            secret_key,
            session_ttl_minutes: parse_var("SESSION_TTL_MINUTES", defaults.session_ttl_minutes)?,
            upload_folder: var_or("UPLOAD_FOLDER", "uploads".to_string()).into(),
            video_folder: var_or("VIDEO_FOLDER", "video_uploads".to_string()).into(),
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
            bind_addr: var_or("BIND_ADDR", defaults.bind_addr),
        })
    }

    /// Postgres connection options: `DATABASE_URL` when given, otherwise the DB_* parts.
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        if let Some(url) = &self.database_url {
            return PgConnectOptions::from_str(url);
        }
        Ok(PgConnectOptions::new()
            .host(&self.db_host)
            .port(self.db_port)
            .username(&self.db_user)
            .password(&self.db_password)
            .database(&self.db_name))
    }

    pub fn secure_cookies(&self) -> bool {
        self.env == Env::Production
    }

    /// Directory holding the files of `folder`.
    pub fn folder(&self, folder: Folder) -> &Path {
        match folder {
            Folder::Notes => &self.upload_folder,
            Folder::Videos => &self.video_folder,
        }
    }
}

fn var_or(name: &str, default: String) -> String {
    env::var(name).unwrap_or(default)
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var: name,
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}
