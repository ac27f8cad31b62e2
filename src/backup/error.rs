use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Backup not found: {0}")]
    NotFound(String),

    #[error("Invalid retention limit {0}: at least one backup must be kept")]
    InvalidLimit(usize),

    #[error("No free backup name left for {0}")]
    NamesExhausted(String),

    #[error("Archive error: {0}")]
    Archive(#[from] crate::archive::ArchiveError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backup task failed: {0}")]
    TaskFailed(String),
}

pub type BackupResult<T> = Result<T, BackupError>;
