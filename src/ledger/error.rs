use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Stored timestamp out of range: {0}")]
    InvalidTimestamp(i64),
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::DatabaseError(err.to_string())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
