use crate::error::StorageError;

/// Abstract storage backend for the pipeline's assets, quarantine records,
/// and cache shards (spec §6.6).
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write raw bytes to a path.
    async fn write_bytes(&self, path: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Write text content to a path.
    async fn write_text(&self, path: &str, text: &str) -> Result<(), StorageError>;

    /// Write bytes such that concurrent readers see either the previous
    /// contents or the new ones in full, never a torn write. Implemented as
    /// write-to-temp-then-rename where the backend supports atomic rename;
    /// required by the semantic cache's persistence contract (spec §4.5).
    async fn write_bytes_atomic(&self, path: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Append bytes to a path, creating it if absent.
    async fn append_bytes(&self, path: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Read raw bytes from a path.
    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Check if a path exists.
    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Create a directory (and parents).
    async fn create_dir(&self, path: &str) -> Result<(), StorageError>;

    /// List entries directly under a directory path, sorted lexically.
    async fn list(&self, dir_path: &str) -> Result<Vec<String>, StorageError>;

    /// Get the public URL for a stored file (for image serving).
    fn public_url(&self, path: &str) -> String;

    /// Storage backend name.
    fn backend_name(&self) -> &str;
}
