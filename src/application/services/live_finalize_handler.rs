use std::sync::Arc;

use tracing::instrument;

use crate::application::ports::{
    EpisodeRepository, JobQueue, LiveSessionRepository, QueueError, RepositoryError,
};
use crate::domain::{EpisodeId, FinalizeJob, LiveSessionId, NewLiveEpisode, TranscodeJob};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// A new episode was created and its transcode job enqueued.
    EpisodeCreated(EpisodeId),
    /// The session already produced an episode.
    AlreadyFinalized(EpisodeId),
    /// A concurrent finalize inserted the episode first.
    LostRace,
}

/// Turns an ended live session into a pending episode.
pub struct LiveFinalizeHandler {
    live_sessions: Arc<dyn LiveSessionRepository>,
    episodes: Arc<dyn EpisodeRepository>,
    queue: Arc<dyn JobQueue>,
    transcode_topic: String,
}

impl LiveFinalizeHandler {
    pub fn new(
        live_sessions: Arc<dyn LiveSessionRepository>,
        episodes: Arc<dyn EpisodeRepository>,
        queue: Arc<dyn JobQueue>,
        transcode_topic: impl Into<String>,
    ) -> Self {
        Self {
            live_sessions,
            episodes,
            queue,
            transcode_topic: transcode_topic.into(),
        }
    }

    #[instrument(skip(self, job), fields(session_id = %job.session_id))]
    pub async fn handle(&self, job: &FinalizeJob) -> Result<FinalizeOutcome, FinalizeError> {
        let snapshot = self
            .live_sessions
            .find_with_episode(job.session_id)
            .await
            .map_err(FinalizeError::Load)?
            .ok_or(FinalizeError::SessionNotFound(job.session_id))?;

        if let Some(existing) = snapshot.episode_id {
            tracing::debug!(episode_id = %existing, "Session already finalized");
            return Ok(FinalizeOutcome::AlreadyFinalized(existing));
        }

        let session = snapshot.session;
        if session.is_live() {
            return Err(FinalizeError::StillLive(session.id));
        }

        let storage_key = job
            .recording_key
            .clone()
            .or_else(|| session.recording_key.clone())
            .ok_or(FinalizeError::MissingRecording(session.id))?;
        let duration_sec = job.duration_sec.or(session.duration_sec);

        if let Err(e) = self
            .live_sessions
            .update_recording(session.id, &storage_key, duration_sec)
            .await
        {
            tracing::warn!(error = %e, "Failed to persist resolved recording on session");
        }

        let episode = NewLiveEpisode {
            id: EpisodeId::new(),
            author_id: session.host_id,
            topic_id: session.topic_id,
            title: session.title.clone(),
            mask: session.mask,
            duration_sec,
            storage_key,
            live_session_id: session.id,
        };

        let inserted = self
            .episodes
            .create_from_live_session(&episode)
            .await
            .map_err(FinalizeError::Insert)?;
        if !inserted {
            tracing::info!("Episode for session created concurrently, nothing to do");
            return Ok(FinalizeOutcome::LostRace);
        }

        let transcode = TranscodeJob::new(episode.id);
        let message_id = self
            .queue
            .enqueue(&self.transcode_topic, &transcode.to_fields())
            .await
            .map_err(FinalizeError::Enqueue)?;

        tracing::info!(
            episode_id = %episode.id,
            storage_key = %episode.storage_key,
            duration_sec = ?episode.duration_sec,
            message_id = %message_id,
            "Live session finalized into episode"
        );
        Ok(FinalizeOutcome::EpisodeCreated(episode.id))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    #[error("live session {0} not found")]
    SessionNotFound(LiveSessionId),
    #[error("live session {0} has not ended")]
    StillLive(LiveSessionId),
    #[error("live session {0} has no recording key")]
    MissingRecording(LiveSessionId),
    #[error("load session: {0}")]
    Load(RepositoryError),
    #[error("insert episode: {0}")]
    Insert(RepositoryError),
    #[error("enqueue transcode: {0}")]
    Enqueue(QueueError),
}
