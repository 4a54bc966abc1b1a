use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::application::ports::{
    EpisodeRepository, LiveSessionRepository, ModerationRepository, RepositoryError,
    SummaryRepository,
};
use crate::domain::{
    Episode, EpisodeId, EpisodeStatus, FlagStatus, LiveSession, LiveSessionId,
    LiveSessionSnapshot, ModerationFlag, NewLiveEpisode, NewModerationFlag, PublishedMedia,
    StorageKey, Summary, Visibility,
};

#[derive(Default)]
struct CatalogState {
    episodes: HashMap<EpisodeId, Episode>,
    sessions: HashMap<LiveSessionId, LiveSession>,
    summaries: HashMap<EpisodeId, Summary>,
    flags: Vec<ModerationFlag>,
}

/// Process-local stand-in for the Postgres tables, with the same
/// status guards and uniqueness rules.
#[derive(Default)]
pub struct InMemoryCatalog {
    state: Mutex<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_episode(&self, episode: Episode) {
        if let Ok(mut state) = self.state.lock() {
            state.episodes.insert(episode.id, episode);
        }
    }

    pub fn insert_session(&self, session: LiveSession) {
        if let Ok(mut state) = self.state.lock() {
            state.sessions.insert(session.id, session);
        }
    }

    pub fn episodes_for_session(&self, session_id: LiveSessionId) -> Vec<Episode> {
        self.state
            .lock()
            .map(|state| {
                state
                    .episodes
                    .values()
                    .filter(|e| e.live_session_id == Some(session_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn session(&self, id: LiveSessionId) -> Option<LiveSession> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.sessions.get(&id).cloned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, CatalogState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))
    }
}

#[async_trait]
impl EpisodeRepository for InMemoryCatalog {
    async fn get_by_id(&self, id: EpisodeId) -> Result<Option<Episode>, RepositoryError> {
        Ok(self.lock()?.episodes.get(&id).cloned())
    }

    async fn find_pending_public(&self, id: EpisodeId) -> Result<Option<Episode>, RepositoryError> {
        Ok(self
            .lock()?
            .episodes
            .get(&id)
            .filter(|e| e.status == EpisodeStatus::PendingPublic)
            .cloned())
    }

    async fn publish(&self, id: EpisodeId, media: &PublishedMedia) -> Result<bool, RepositoryError> {
        let mut state = self.lock()?;
        let Some(episode) = state
            .episodes
            .get_mut(&id)
            .filter(|e| e.status == EpisodeStatus::PendingPublic)
        else {
            return Ok(false);
        };

        let now = Utc::now();
        episode.status = EpisodeStatus::Public;
        episode.playback_url = Some(media.playback_url.clone());
        episode.storage_key = Some(media.storage_key.clone());
        episode.size_bytes = Some(media.size_bytes);
        episode.waveform = Some(media.waveform.clone());
        episode.duration_sec = Some(media.duration_sec);
        episode.status_changed_at = Some(now);
        episode.updated_at = now;
        episode.published_at.get_or_insert(now);
        Ok(true)
    }

    async fn mark_deleted(&self, id: EpisodeId) -> Result<bool, RepositoryError> {
        let mut state = self.lock()?;
        let Some(episode) = state.episodes.get_mut(&id).filter(|e| {
            matches!(
                e.status,
                EpisodeStatus::PendingUpload | EpisodeStatus::PendingPublic
            )
        }) else {
            return Ok(false);
        };

        let now = Utc::now();
        episode.status = EpisodeStatus::Deleted;
        episode.status_changed_at = Some(now);
        episode.updated_at = now;
        Ok(true)
    }

    async fn create_from_live_session(
        &self,
        new: &NewLiveEpisode,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.lock()?;
        if state
            .episodes
            .values()
            .any(|e| e.live_session_id == Some(new.live_session_id))
        {
            return Ok(false);
        }
        if state.episodes.contains_key(&new.id) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "duplicate episode id {}",
                new.id
            )));
        }

        let now = Utc::now();
        state.episodes.insert(
            new.id,
            Episode {
                id: new.id,
                author_id: new.author_id,
                topic_id: new.topic_id,
                title: new.title.clone(),
                visibility: Visibility::Public,
                status: EpisodeStatus::PendingPublic,
                mask: new.mask,
                quality: "standard".to_string(),
                storage_key: Some(new.storage_key.clone()),
                playback_url: None,
                duration_sec: new.duration_sec,
                size_bytes: None,
                waveform: None,
                is_live: true,
                live_session_id: Some(new.live_session_id),
                status_changed_at: Some(now),
                published_at: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(true)
    }
}

#[async_trait]
impl LiveSessionRepository for InMemoryCatalog {
    async fn find_with_episode(
        &self,
        id: LiveSessionId,
    ) -> Result<Option<LiveSessionSnapshot>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.sessions.get(&id).map(|session| LiveSessionSnapshot {
            session: session.clone(),
            episode_id: state
                .episodes
                .values()
                .find(|e| e.live_session_id == Some(id))
                .map(|e| e.id),
        }))
    }

    async fn update_recording(
        &self,
        id: LiveSessionId,
        recording_key: &StorageKey,
        duration_sec: Option<i32>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if let Some(session) = state.sessions.get_mut(&id) {
            if !recording_key.as_str().is_empty() {
                session.recording_key = Some(recording_key.clone());
            }
            if duration_sec.is_some() {
                session.duration_sec = duration_sec;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SummaryRepository for InMemoryCatalog {
    async fn upsert(&self, summary: &Summary) -> Result<(), RepositoryError> {
        self.lock()?
            .summaries
            .insert(summary.episode_id, summary.clone());
        Ok(())
    }

    async fn get(&self, episode_id: EpisodeId) -> Result<Option<Summary>, RepositoryError> {
        Ok(self.lock()?.summaries.get(&episode_id).cloned())
    }
}

#[async_trait]
impl ModerationRepository for InMemoryCatalog {
    async fn insert_flag(&self, flag: &NewModerationFlag) -> Result<bool, RepositoryError> {
        let mut state = self.lock()?;
        if state
            .flags
            .iter()
            .any(|f| f.object_ref == flag.object_ref && f.reason == flag.reason)
        {
            return Ok(false);
        }

        let id = state.flags.len() as i64 + 1;
        state.flags.push(ModerationFlag {
            id,
            object_ref: flag.object_ref.clone(),
            severity: flag.severity,
            reason: flag.reason.clone(),
            status: FlagStatus::Open,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn list_for_object(&self, object_ref: &str) -> Result<Vec<ModerationFlag>, RepositoryError> {
        Ok(self
            .lock()?
            .flags
            .iter()
            .filter(|f| f.object_ref == object_ref)
            .cloned()
            .collect())
    }
}
