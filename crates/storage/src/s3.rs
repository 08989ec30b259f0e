use crate::error::StorageError;
use crate::traits::StorageBackend;
use aws_sdk_s3::Client;

/// AWS S3 storage backend.
pub struct S3Storage {
    client: Client,
    bucket: String,
    prefix: String,
    public_base_url: String,
}

impl S3Storage {
    /// Create a new S3 storage backend.
    ///
    /// `public_base_url` is the base URL for public access (e.g., CloudFront URL or S3 bucket URL).
    pub async fn new(
        bucket: String,
        prefix: String,
        public_base_url: String,
    ) -> Result<Self, StorageError> {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = Client::new(&config);
        Ok(Self {
            client,
            bucket,
            prefix,
            public_base_url,
        })
    }

    fn s3_key(&self, path: &str) -> String {
        if self.prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.prefix.trim_end_matches('/'), path)
        }
    }

    fn content_type(path: &str) -> &'static str {
        if path.ends_with(".png") {
            "image/png"
        } else if path.ends_with(".jpg") || path.ends_with(".jpeg") {
            "image/jpeg"
        } else if path.ends_with(".md") {
            "text/markdown; charset=utf-8"
        } else if path.ends_with(".json") {
            "application/json; charset=utf-8"
        } else {
            "application/octet-stream"
        }
    }
}

#[async_trait::async_trait]
impl StorageBackend for S3Storage {
    async fn write_bytes(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        let key = self.s3_key(path);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(Self::content_type(path))
            .body(data.to_vec().into())
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("Failed to upload {key}: {e}")))?;
        Ok(())
    }

    async fn write_text(&self, path: &str, text: &str) -> Result<(), StorageError> {
        self.write_bytes(path, text.as_bytes()).await
    }

    async fn write_bytes_atomic(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        // A single PUT is already atomic at the object level: readers observe
        // either the prior object or the new one in full.
        self.write_bytes(path, data).await
    }

    async fn append_bytes(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        let mut existing = match self.read_bytes(path).await {
            Ok(bytes) => bytes,
            Err(StorageError::S3(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        existing.extend_from_slice(data);
        self.write_bytes(path, &existing).await
    }

    async fn read_bytes(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let key = self.s3_key(path);
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("Failed to read {key}: {e}")))?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(format!("Failed to read body for {key}: {e}")))?
            .into_bytes()
            .to_vec();
        Ok(data)
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let key = self.s3_key(path);
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    async fn create_dir(&self, _path: &str) -> Result<(), StorageError> {
        // S3 doesn't have directories, no-op
        Ok(())
    }

    async fn list(&self, dir_path: &str) -> Result<Vec<String>, StorageError> {
        let prefix = self.s3_key(dir_path.trim_end_matches('/'));
        let prefix = format!("{prefix}/");
        let resp = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&prefix)
            .send()
            .await
            .map_err(|e| StorageError::S3(format!("Failed to list {prefix}: {e}")))?;
        let mut names: Vec<String> = resp
            .contents()
            .iter()
            .filter_map(|obj| obj.key())
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty())
            .map(|rest| rest.to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    fn public_url(&self, path: &str) -> String {
        let key = self.s3_key(path);
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), key)
    }

    fn backend_name(&self) -> &str {
        "s3"
    }
}
