use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as StorePath;
use object_store::{Attribute, AttributeValue, Attributes, ObjectStore, PutOptions, PutPayload};
use tracing::instrument;

use crate::application::ports::{ByteStream, MediaStore, MediaStoreError};
use crate::domain::StorageKey;

/// Connection details for an S3-compatible bucket.
#[derive(Debug, Clone)]
pub struct S3Location<'a> {
    pub bucket: &'a str,
    pub region: &'a str,
    pub endpoint: Option<&'a str>,
    pub access_key_id: Option<&'a str>,
    pub secret_access_key: Option<&'a str>,
}

/// [`MediaStore`] over any `object_store` backend.
pub struct ObjectMediaStore {
    inner: Arc<dyn ObjectStore>,
    location_prefix: String,
    /// The local filesystem backend rejects object attributes.
    supports_metadata: bool,
}

impl ObjectMediaStore {
    pub fn local(base_path: PathBuf) -> Result<Self, MediaStoreError> {
        std::fs::create_dir_all(&base_path)?;
        let fs = LocalFileSystem::new_with_prefix(&base_path)
            .map_err(|e| MediaStoreError::Configuration(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(fs),
            location_prefix: format!("file://{}", base_path.display()),
            supports_metadata: false,
        })
    }

    pub fn s3(location: &S3Location<'_>) -> Result<Self, MediaStoreError> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(location.bucket)
            .with_region(location.region);
        if let Some(endpoint) = location.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        if let (Some(key_id), Some(secret)) = (location.access_key_id, location.secret_access_key) {
            builder = builder
                .with_access_key_id(key_id)
                .with_secret_access_key(secret);
        }
        let store = builder
            .build()
            .map_err(|e| MediaStoreError::Configuration(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(store),
            location_prefix: format!("s3://{}", location.bucket),
            supports_metadata: true,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
            location_prefix: "memory://".to_string(),
            supports_metadata: true,
        }
    }

    /// Reads a whole object; used to inspect uploaded artifacts.
    pub async fn read(&self, key: &StorageKey) -> Result<Bytes, MediaStoreError> {
        let result = self
            .inner
            .get(&StorePath::from(key.as_str()))
            .await
            .map_err(|e| map_get_error(key, e))?;
        result
            .bytes()
            .await
            .map_err(|e| MediaStoreError::DownloadFailed(e.to_string()))
    }

    /// Metadata stored alongside an object, empty when the backend keeps none.
    pub async fn metadata(
        &self,
        key: &StorageKey,
    ) -> Result<Vec<(String, String)>, MediaStoreError> {
        let result = self
            .inner
            .get(&StorePath::from(key.as_str()))
            .await
            .map_err(|e| map_get_error(key, e))?;

        Ok(result
            .attributes
            .iter()
            .filter_map(|(attribute, value)| match attribute {
                Attribute::Metadata(name) => Some((name.to_string(), value.to_string())),
                _ => None,
            })
            .collect())
    }
}

fn map_get_error(key: &StorageKey, error: object_store::Error) -> MediaStoreError {
    match error {
        object_store::Error::NotFound { .. } => MediaStoreError::NotFound(key.to_string()),
        other => MediaStoreError::DownloadFailed(other.to_string()),
    }
}

#[async_trait::async_trait]
impl MediaStore for ObjectMediaStore {
    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &StorageKey) -> Result<ByteStream, MediaStoreError> {
        let result = self
            .inner
            .get(&StorePath::from(key.as_str()))
            .await
            .map_err(|e| map_get_error(key, e))?;

        Ok(result
            .into_stream()
            .map(|chunk| chunk.map_err(|e| MediaStoreError::DownloadFailed(e.to_string())))
            .boxed())
    }

    #[instrument(skip(self, data, metadata), fields(key = %key, size_bytes = data.len()))]
    async fn put(
        &self,
        key: &StorageKey,
        data: Bytes,
        metadata: &[(&str, &str)],
    ) -> Result<String, MediaStoreError> {
        let mut attributes = Attributes::new();
        if self.supports_metadata {
            for (name, value) in metadata {
                attributes.insert(
                    Attribute::Metadata(name.to_string().into()),
                    AttributeValue::from(value.to_string()),
                );
            }
        }
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        self.inner
            .put_opts(&StorePath::from(key.as_str()), PutPayload::from(data), options)
            .await
            .map_err(|e| MediaStoreError::UploadFailed(e.to_string()))?;

        Ok(format!(
            "{}/{}",
            self.location_prefix.trim_end_matches('/'),
            key
        ))
    }
}
