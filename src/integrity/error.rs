use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk directory under {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create scan root {path}: {source}")]
    CreateRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scan task failed: {0}")]
    TaskFailed(String),
}

impl ScanError {
    /// The underlying I/O error, if any
    pub fn io_error(&self) -> Option<&std::io::Error> {
        match self {
            ScanError::Read { source, .. }
            | ScanError::Walk { source, .. }
            | ScanError::CreateRoot { source, .. } => Some(source),
            ScanError::TaskFailed(_) => None,
        }
    }
}

pub type ScanResult<T> = Result<T, ScanError>;
