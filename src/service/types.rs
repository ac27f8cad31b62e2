use crate::service::error::{ServiceError, ServiceResult};
use crate::sync::SyncReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Failure category reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "NotFoundError")]
    NotFound,
    #[serde(rename = "ConflictError")]
    Conflict,
    #[serde(rename = "IOError")]
    Io,
    #[serde(rename = "PermissionError")]
    PermissionDenied,
    /// Consumer went away mid-download; informational
    #[serde(rename = "StreamAbortedError")]
    StreamAborted,
    #[serde(rename = "ExtractionError")]
    Extraction,
    #[serde(rename = "InvalidRequestError")]
    InvalidRequest,
    #[serde(rename = "InternalError")]
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Conflict => "ConflictError",
            ErrorKind::Io => "IOError",
            ErrorKind::PermissionDenied => "PermissionError",
            ErrorKind::StreamAborted => "StreamAbortedError",
            ErrorKind::Extraction => "ExtractionError",
            ErrorKind::InvalidRequest => "InvalidRequestError",
            ErrorKind::Internal => "InternalError",
        };
        f.write_str(name)
    }
}

/// Structured failure handed to the boundary layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreFailure {
    pub kind: ErrorKind,
    pub message: String,
}

/// The authenticated user an operation acts for. Its name is a path
/// segment under every storage root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    username: String,
}

impl Identity {
    pub fn new(username: impl Into<String>) -> ServiceResult<Self> {
        let username = username.into();
        crate::tree::validate_name("user", &username)?;
        Ok(Self { username })
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

impl TryFrom<&str> for Identity {
    type Error = ServiceError;

    fn try_from(username: &str) -> ServiceResult<Self> {
        Self::new(username)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Reconciled; extras already deleted from the server
    Report(SyncReport),
    /// The server holds a newer sync than the client; it must download first
    PullRequired { server_last_sync: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub game_name: String,
    pub files_extracted: u64,
    pub backup: String,
    pub evicted_backups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameDeletion {
    pub game_name: String,
    pub backups_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRename {
    pub old_name: String,
    pub new_name: String,
    /// Directories moved, relative to the data root
    pub renamed_paths: Vec<String>,
}

/// An upload body written to the staging area; the file is removed when
/// this is dropped.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    pub(crate) bytes: u64,
}

impl StagedUpload {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path, bytes: 0 }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(staged = %self.path.display(), error = %e, "failed to remove staged upload");
            }
        }
    }
}
