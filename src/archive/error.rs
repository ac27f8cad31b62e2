use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Source directory not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("Archive stream aborted after {bytes_sent} bytes: consumer disconnected")]
    StreamAborted { bytes_sent: u64 },

    #[error("Archive producer failed: {0}")]
    ProducerFailed(String),

    #[error("Failed to extract {archive}: {reason}")]
    Extraction { archive: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive task failed: {0}")]
    TaskFailed(String),
}

impl ArchiveError {
    pub(crate) fn extraction(archive: &std::path::Path, reason: impl Into<String>) -> Self {
        ArchiveError::Extraction {
            archive: archive.to_path_buf(),
            reason: reason.into(),
        }
    }
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
