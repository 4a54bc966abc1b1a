use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::{EpisodeId, Summary};

#[async_trait]
pub trait SummaryRepository: Send + Sync {
    async fn upsert(&self, summary: &Summary) -> Result<(), RepositoryError>;

    async fn get(&self, episode_id: EpisodeId) -> Result<Option<Summary>, RepositoryError>;
}
