pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors produced when opening persistent storage or when an operation is cancelled.
///
/// Database failures on the data path do not surface here; they are logged and
/// reported as "absent" or "not written".
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to determine home directory for default storage path")]
    MissingHomeDir,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage operation cancelled")]
    Cancelled,
}

impl StorageError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StorageError::Cancelled)
    }
}
