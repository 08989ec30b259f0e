use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(String),

    #[error("Storage config error: {0}")]
    Config(String),

    /// The write-to-temp-then-rename step of `write_bytes_atomic` didn't
    /// land: the caller should not assume the destination was updated.
    #[error("atomic write failed: {0}")]
    AtomicWriteFailed(String),
}
