use async_trait::async_trait;
use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::io::AsyncWrite;

use crate::config::AppConfig;

/// Extensions accepted by `POST /upload_note`.
pub const NOTE_EXTENSIONS: &[&str] = &["pdf"];
/// Extensions accepted by `POST /upload_video`.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm"];

/// Folder
///
/// The two fixed directories uploaded files land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Folder {
    Notes,
    Videos,
}

impl Folder {
    pub fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            Folder::Notes => NOTE_EXTENSIONS,
            Folder::Videos => VIDEO_EXTENSIONS,
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("refusing unsafe filename {0:?}")]
    UnsafeName(String),
    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),
}

/// Open write handle returned by [`FileStore::create`].
pub type FileSink = Box<dyn AsyncWrite + Send + Unpin>;

// 1. FileStore Contract
/// FileStore
///
/// Abstract contract for writing uploaded files. Uploads are streamed through the
/// returned [`FileSink`] chunk by chunk, never buffered whole. Reading is left to
/// the static file service mounted on the same folders.
///
/// Implementations only accept names for which [`is_safe_filename`] holds.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Creates the backing folders if they are missing. Safe to call at startup.
    async fn ensure_folders(&self) -> Result<(), StorageError>;

    /// Opens `filename` for writing, truncating any file of the same name.
    async fn create(&self, folder: Folder, filename: &str) -> Result<FileSink, StorageError>;

    /// Deletes `filename`. A file that is already gone is not an error.
    async fn remove(&self, folder: Folder, filename: &str) -> Result<(), StorageError>;
}

/// FileStoreState
///
/// The concrete type used to share the file store across the application state.
pub type FileStoreState = Arc<dyn FileStore>;

// 2. The Real Implementation (local directories)
/// LocalFileStore
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    notes_dir: PathBuf,
    videos_dir: PathBuf,
}

impl LocalFileStore {
    pub fn new(notes_dir: impl Into<PathBuf>, videos_dir: impl Into<PathBuf>) -> Self {
        Self {
            notes_dir: notes_dir.into(),
            videos_dir: videos_dir.into(),
        }
    }

    /// Writes into the same folders the server reads `/uploads` and `/videos` from.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.folder(Folder::Notes), config.folder(Folder::Videos))
    }

    fn dir(&self, folder: Folder) -> &Path {
        match folder {
            Folder::Notes => &self.notes_dir,
            Folder::Videos => &self.videos_dir,
        }
    }

    fn path_for(&self, folder: Folder, filename: &str) -> Result<PathBuf, StorageError> {
        if !is_safe_filename(filename) {
            return Err(StorageError::UnsafeName(filename.to_string()));
        }
        Ok(self.dir(folder).join(filename))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn ensure_folders(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.notes_dir).await?;
        tokio::fs::create_dir_all(&self.videos_dir).await?;
        Ok(())
    }

    async fn create(&self, folder: Folder, filename: &str) -> Result<FileSink, StorageError> {
        let path = self.path_for(folder, filename)?;
        let file = tokio::fs::File::create(&path).await?;
        tracing::debug!(path = %path.display(), "file opened for upload");
        Ok(Box::new(file))
    }

    async fn remove(&self, folder: Folder, filename: &str) -> Result<(), StorageError> {
        let path = self.path_for(folder, filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// --- Filename helpers ---

/// secure_filename
///
/// Reduces a client-supplied filename to a flat, ASCII-only name that is safe to
/// join onto an upload folder: path separators become spaces, whitespace runs become
/// `_`, every character outside `[A-Za-z0-9_.-]` is dropped and leading/trailing
/// `.`/`_` are stripped. The result may be empty.
pub fn secure_filename(name: &str) -> String {
    let flattened: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = flattened.split_whitespace().collect::<Vec<_>>().join("_");

    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// True when `name` is non-empty and already in [`secure_filename`] form.
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty() && secure_filename(name) == name
}

/// extension_allowed
///
/// Checks the text after the last `.` (case-insensitively) against `allowed`.
/// Names without a `.` are rejected.
pub fn extension_allowed(name: &str, allowed: &[&str]) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| allowed.contains(&ext.as_str()))
}
