use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("Invalid {kind} name: {name:?}")]
    InvalidName { kind: &'static str, name: String },

    #[error("Invalid file key: {0:?}")]
    InvalidKey(String),

    #[error("Conflicting hashes for file key {0:?}")]
    DuplicateKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TreeResult<T> = Result<T, TreeError>;
