use std::sync::Arc;

use tracing::instrument;

use super::{AudioProcessingError, AudioProcessingService, ModerationScanner, SummaryDeriver};
use crate::application::ports::{
    EpisodeRepository, ModerationRepository, RepositoryError, SummaryRepository,
};
use crate::domain::{EpisodeId, EpisodeStatus, NewModerationFlag, PublishedMedia, Summary};

#[derive(Debug, Clone, PartialEq)]
pub enum TranscodeOutcome {
    Published {
        duration_sec: i32,
        flags_raised: usize,
    },
    /// The episode is not `pending_public`: already handled or never uploaded.
    NotPending,
    /// Someone else moved the episode on while it was being processed.
    LostRace,
}

/// Publishes one recorded episode.
pub struct EpisodeTranscodeHandler {
    episodes: Arc<dyn EpisodeRepository>,
    summaries: Arc<dyn SummaryRepository>,
    moderation: Arc<dyn ModerationRepository>,
    audio: Arc<AudioProcessingService>,
    summary_deriver: SummaryDeriver,
    scanner: ModerationScanner,
    cdn_base_url: Option<String>,
}

impl EpisodeTranscodeHandler {
    pub fn new(
        episodes: Arc<dyn EpisodeRepository>,
        summaries: Arc<dyn SummaryRepository>,
        moderation: Arc<dyn ModerationRepository>,
        audio: Arc<AudioProcessingService>,
        scanner: ModerationScanner,
        cdn_base_url: Option<String>,
    ) -> Self {
        Self {
            episodes,
            summaries,
            moderation,
            audio,
            summary_deriver: SummaryDeriver,
            scanner,
            cdn_base_url,
        }
    }

    #[instrument(skip(self), fields(episode_id = %episode_id))]
    pub async fn handle(&self, episode_id: EpisodeId) -> Result<TranscodeOutcome, TranscodeError> {
        let Some(episode) = self
            .episodes
            .find_pending_public(episode_id)
            .await
            .map_err(TranscodeError::Load)?
        else {
            tracing::debug!("Episode is not pending_public, skipping");
            return Ok(TranscodeOutcome::NotPending);
        };

        let source = episode
            .storage_key
            .as_ref()
            .ok_or(TranscodeError::MissingStorageKey(episode_id))?;

        let processed = self
            .audio
            .process(episode_id, source, episode.mask)
            .await
            .map_err(TranscodeError::Processing)?;

        let duration_sec = i32::try_from(processed.duration.as_secs()).unwrap_or(i32::MAX);
        let media = PublishedMedia {
            playback_url: processed
                .storage_key
                .playback_url(self.cdn_base_url.as_deref()),
            storage_key: processed.storage_key,
            size_bytes: i64::try_from(processed.size_bytes).unwrap_or(i64::MAX),
            duration_sec,
            waveform: processed.waveform,
        };

        let published = self
            .episodes
            .publish(episode_id, &media)
            .await
            .map_err(TranscodeError::Publish)?;
        if !published {
            tracing::warn!("Episode left pending_public during processing, not publishing");
            return Ok(TranscodeOutcome::LostRace);
        }
        tracing::info!(
            duration_sec,
            size_bytes = media.size_bytes,
            playback_url = %media.playback_url,
            "Episode published"
        );

        let summary = self
            .summary_deriver
            .derive(episode_id, episode.mask, duration_sec);
        if let Err(e) = self.summaries.upsert(&summary).await {
            tracing::warn!(error = %e, "Failed to store episode summary");
        }
        let flags_raised = self.flag_keyword_hits(episode_id, &summary).await;

        Ok(TranscodeOutcome::Published {
            duration_sec,
            flags_raised,
        })
    }

    /// Terminal failure: hide the episode and leave a flag for moderators.
    /// An episode that is already public is left alone.
    #[instrument(skip(self, reason), fields(episode_id = %episode_id))]
    pub async fn dead_letter(
        &self,
        episode_id: EpisodeId,
        reason: &str,
    ) -> Result<(), RepositoryError> {
        let deleted = self.episodes.mark_deleted(episode_id).await?;
        if deleted {
            tracing::warn!(reason, "Episode marked deleted after exhausting retries");
        } else if self
            .episodes
            .get_by_id(episode_id)
            .await?
            .is_some_and(|episode| episode.status == EpisodeStatus::Public)
        {
            tracing::info!(reason, "Episode was published by another run, not flagging");
            return Ok(());
        }

        let flag = NewModerationFlag::processing_failed(episode_id.object_ref(), reason);
        self.moderation.insert_flag(&flag).await?;
        Ok(())
    }

    async fn flag_keyword_hits(&self, episode_id: EpisodeId, summary: &Summary) -> usize {
        let texts = std::iter::once(summary.tldr.as_str())
            .chain(summary.keywords.iter().map(String::as_str));
        let hits = self.scanner.scan_all(texts);

        let mut raised = 0;
        for term in &hits {
            let flag = NewModerationFlag::keyword_hit(episode_id.object_ref(), term);
            match self.moderation.insert_flag(&flag).await {
                Ok(true) => raised += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(error = %e, term = %term, "Failed to record keyword flag"),
            }
        }
        if !hits.is_empty() {
            tracing::info!(terms = ?hits, raised, "Summary matched moderation keywords");
        }
        raised
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("load episode: {0}")]
    Load(RepositoryError),
    #[error("episode {0} has no storage key")]
    MissingStorageKey(EpisodeId),
    #[error("{0}")]
    Processing(#[from] AudioProcessingError),
    #[error("publish episode: {0}")]
    Publish(RepositoryError),
}
