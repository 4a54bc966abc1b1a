use bytes::Bytes;
use futures::stream::BoxStream;

use crate::domain::StorageKey;

pub type ByteStream = BoxStream<'static, Result<Bytes, MediaStoreError>>;

#[async_trait::async_trait]
pub trait MediaStore: Send + Sync {
    async fn get(&self, key: &StorageKey) -> Result<ByteStream, MediaStoreError>;

    /// Stores `data` under `key` and returns the object location.
    async fn put(
        &self,
        key: &StorageKey,
        data: Bytes,
        metadata: &[(&str, &str)],
    ) -> Result<String, MediaStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MediaStoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("download failed: {0}")]
    DownloadFailed(String),
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("store configuration: {0}")]
    Configuration(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
