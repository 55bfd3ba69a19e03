use std::io;
use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Errors returned by [`crate::store::NoteStore`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot determine the user documents directory")]
    NoDocumentsDir,

    #[error("failed to create notes directory {path:?}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to read notes directory {path:?}: {source}")]
    ReadDir { path: PathBuf, source: io::Error },

    #[error("failed to serialize note {id}: {source}")]
    Serialize {
        id: Uuid,
        source: serde_json::Error,
    },

    #[error("failed to write note file {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to remove note file {path:?}: {source}")]
    Remove { path: PathBuf, source: io::Error },

    #[error("note {0} not found")]
    NotFound(Uuid),
}

/// Errors reading or writing the session file.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot determine the user config directory")]
    NoConfigDir,

    #[error("failed to write session file {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors reported by a [`crate::surface::SurfaceHost`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SurfaceError {
    /// The surface no longer exists (typically closed by the user).
    #[error("surface {0} is no longer open")]
    Gone(u64),

    #[error("platform refused to open a surface: {0}")]
    OpenFailed(String),

    #[error("surface host error: {0}")]
    Host(String),
}
