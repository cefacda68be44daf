use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed settings or week record, rejected before it reaches the grid or the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// The SQLite file could not be opened, read or written
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Week {index} is outside the grid of {total} weeks")]
    OutOfRange { index: i64, total: u32 },

    /// Grid operations need a birth date; onboarding has not happened yet
    #[error("No settings saved yet")]
    MissingSettings,
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        Error::StorageUnavailable(value.to_string())
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
