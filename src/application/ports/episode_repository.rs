use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::{Episode, EpisodeId, NewLiveEpisode, PublishedMedia};

#[async_trait]
pub trait EpisodeRepository: Send + Sync {
    async fn get_by_id(&self, id: EpisodeId) -> Result<Option<Episode>, RepositoryError>;

    /// Loads the episode only while it is `pending_public`.
    async fn find_pending_public(&self, id: EpisodeId) -> Result<Option<Episode>, RepositoryError>;

    /// Moves a `pending_public` episode to `public`. `published_at` keeps its
    /// first value. Returns `false` when the episode was no longer pending.
    async fn publish(&self, id: EpisodeId, media: &PublishedMedia) -> Result<bool, RepositoryError>;

    /// Returns `false` when the episode was already deleted.
    async fn mark_deleted(&self, id: EpisodeId) -> Result<bool, RepositoryError>;

    /// Returns `false` when another episode already references the session.
    async fn create_from_live_session(
        &self,
        episode: &NewLiveEpisode,
    ) -> Result<bool, RepositoryError>;
}
