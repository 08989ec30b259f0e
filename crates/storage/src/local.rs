use crate::error::StorageError;
use crate::traits::StorageBackend;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage backend.
pub struct LocalStorage {
    /// Root directory for all stored files.
    root: PathBuf,
    /// Base URL for serving files (e.g., "http://localhost:8899").
    base_url: String,
}

impl LocalStorage {
    pub fn new(root: PathBuf, base_url: String) -> Self {
        Self { root, base_url }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait::async_trait]
impl StorageBackend for LocalStorage {
    async fn write_bytes(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, data).await?;
        Ok(())
    }

    async fn write_text(&self, path: &str, text: &str) -> Result<(), StorageError> {
        self.write_bytes(path, text.as_bytes()).await
    }

    async fn write_bytes_atomic(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = full.with_extension(format!(
            "{}.tmp-{}",
            full.extension().and_then(|e| e.to_str()).unwrap_or("bin"),
            uuid::Uuid::new_v4()
        ));
        tokio::fs::write(&tmp, data).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &full).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StorageError::AtomicWriteFailed(format!(
                "rename {} -> {}: {e}",
                tmp.display(),
                full.display()
            )));
        }
        Ok(())
    }

    async fn append_bytes(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&full)
            .await?;
        file.write_all(data).await?;
        Ok(())
    }

    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.full_path(path);
        let data = tokio::fs::read(&full).await?;
        Ok(data)
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let full = self.full_path(path);
        Ok(tokio::fs::try_exists(&full).await.unwrap_or(false))
    }

    async fn create_dir(&self, path: &str) -> Result<(), StorageError> {
        let full = self.full_path(path);
        tokio::fs::create_dir_all(&full).await?;
        Ok(())
    }

    async fn list(&self, dir_path: &str) -> Result<Vec<String>, StorageError> {
        let full = self.full_path(dir_path);
        if !tokio::fs::try_exists(&full).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let mut entries = tokio::fs::read_dir(&full).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn backend_name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn atomic_write_then_read_roundtrips() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf(), "http://localhost".to_string());
        storage.write_bytes_atomic("out.md", b"hello").await.unwrap();
        assert_eq!(storage.read_bytes("out.md").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn atomic_write_reports_a_distinct_error_when_the_rename_step_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf(), "http://localhost".to_string());
        // A directory sitting at the destination path makes the rename step
        // fail (EISDIR) after the temp file has already been written.
        tokio::fs::create_dir_all(dir.path().join("out.md")).await.unwrap();

        let err = storage.write_bytes_atomic("out.md", b"hello").await.unwrap_err();
        assert!(matches!(err, StorageError::AtomicWriteFailed(_)));
    }
}
