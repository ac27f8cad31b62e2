use crate::archive::ArchiveError;
use crate::backup::BackupError;
use crate::integrity::ScanError;
use crate::ledger::LedgerError;
use crate::service::types::{CoreFailure, ErrorKind};
use crate::tree::TreeError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Saves not found for game '{0}'")]
    GameNotFound(String),

    #[error("Backup '{backup}' not found for game '{game}'")]
    BackupNotFound { game: String, backup: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error("Sync ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Task failed: {0}")]
    TaskFailed(String),
}

impl ServiceError {
    /// Classify the failure for the boundary layer
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ServiceError::GameNotFound(_) | ServiceError::BackupNotFound { .. } => {
                ErrorKind::NotFound
            }
            ServiceError::Conflict(_) => ErrorKind::Conflict,
            ServiceError::Tree(
                TreeError::InvalidName { .. }
                | TreeError::InvalidKey(_)
                | TreeError::DuplicateKey(_),
            ) => ErrorKind::InvalidRequest,
            ServiceError::Tree(TreeError::Io(e)) => io_kind(e),
            ServiceError::Scan(e) => e.io_error().map_or(ErrorKind::Internal, io_kind),
            ServiceError::Archive(e) => archive_kind(e),
            ServiceError::Backup(BackupError::NotFound(_)) => ErrorKind::NotFound,
            ServiceError::Backup(BackupError::Archive(e)) => archive_kind(e),
            ServiceError::Backup(BackupError::Io(e)) => io_kind(e),
            ServiceError::Backup(BackupError::NamesExhausted(_)) => ErrorKind::Conflict,
            ServiceError::Backup(BackupError::InvalidLimit(_) | BackupError::TaskFailed(_)) => {
                ErrorKind::Internal
            }
            ServiceError::Ledger(_) | ServiceError::TaskFailed(_) => ErrorKind::Internal,
            ServiceError::Io(e) => io_kind(e),
        }
    }

    pub fn to_failure(&self) -> CoreFailure {
        CoreFailure {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

fn io_kind(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        _ => ErrorKind::Io,
    }
}

fn archive_kind(err: &ArchiveError) -> ErrorKind {
    match err {
        ArchiveError::SourceNotFound(_) => ErrorKind::NotFound,
        ArchiveError::DestinationExists(_) => ErrorKind::Conflict,
        ArchiveError::StreamAborted { .. } => ErrorKind::StreamAborted,
        ArchiveError::Extraction { .. } => ErrorKind::Extraction,
        ArchiveError::ProducerFailed(_) => ErrorKind::Io,
        ArchiveError::Io(e) => io_kind(e),
        ArchiveError::TaskFailed(_) => ErrorKind::Internal,
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
