use std::sync::Arc;

use crate::application::ports::MediaStoreError;
use crate::runtime::config::{StorageProviderSetting, StorageSettings};

use super::object_media_store::{ObjectMediaStore, S3Location};

const DEFAULT_S3_REGION: &str = "us-east-1";

pub struct MediaStoreFactory;

impl MediaStoreFactory {
    pub fn create(settings: &StorageSettings) -> Result<Arc<ObjectMediaStore>, MediaStoreError> {
        match settings.provider {
            StorageProviderSetting::Local => {
                let store = ObjectMediaStore::local(settings.local_path.clone())?;
                Ok(Arc::new(store))
            }
            StorageProviderSetting::S3 => {
                let bucket = settings.s3_bucket.as_deref().ok_or_else(|| {
                    MediaStoreError::Configuration("s3_bucket required".into())
                })?;
                let location = S3Location {
                    bucket,
                    region: settings.s3_region.as_deref().unwrap_or(DEFAULT_S3_REGION),
                    endpoint: settings.s3_endpoint.as_deref(),
                    access_key_id: settings.s3_access_key_id.as_deref(),
                    secret_access_key: settings.s3_secret_access_key.as_deref(),
                };
                let store = ObjectMediaStore::s3(&location)?;
                Ok(Arc::new(store))
            }
            StorageProviderSetting::Memory => Ok(Arc::new(ObjectMediaStore::in_memory())),
        }
    }
}
