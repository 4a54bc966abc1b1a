use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::{LiveSessionId, LiveSessionSnapshot, StorageKey};

#[async_trait]
pub trait LiveSessionRepository: Send + Sync {
    async fn find_with_episode(
        &self,
        id: LiveSessionId,
    ) -> Result<Option<LiveSessionSnapshot>, RepositoryError>;

    /// `None` keeps the stored duration.
    async fn update_recording(
        &self,
        id: LiveSessionId,
        recording_key: &StorageKey,
        duration_sec: Option<i32>,
    ) -> Result<(), RepositoryError>;
}
