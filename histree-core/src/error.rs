use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Broken content: {id}")]
    BrokenContent { id: i64 },

    #[error("Content is unavailable")]
    ContentUnavailable,

    #[error("History is inconsistent: {0}")]
    InconsistentHistory(String),

    #[error("Malformed stream: {0}")]
    Stream(String),

    #[error("Change carries uncommitted state and cannot be serialized")]
    UnappliedChange,
}

impl Error {
    pub fn inconsistent(message: impl Into<String>) -> Self {
        Error::InconsistentHistory(message.into())
    }

    pub fn stream(message: impl Into<String>) -> Self {
        Error::Stream(message.into())
    }
}
