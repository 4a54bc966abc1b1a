use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    EpisodeId, EpisodeStatus, LiveSessionId, StorageKey, TopicId, UserId, Visibility, VoiceMask,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub id: EpisodeId,
    pub author_id: UserId,
    pub topic_id: Option<TopicId>,
    pub title: Option<String>,
    pub visibility: Visibility,
    pub status: EpisodeStatus,
    pub mask: VoiceMask,
    pub quality: String,
    pub storage_key: Option<StorageKey>,
    pub playback_url: Option<String>,
    pub duration_sec: Option<i32>,
    pub size_bytes: Option<i64>,
    pub waveform: Option<Waveform>,
    pub is_live: bool,
    pub live_session_id: Option<LiveSessionId>,
    pub status_changed_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Episode {
    /// An uploaded recording waiting for the worker, as the upload
    /// handler leaves it.
    pub fn pending_public(author_id: UserId, mask: VoiceMask, storage_key: StorageKey) -> Self {
        let now = Utc::now();
        Self {
            id: EpisodeId::new(),
            author_id,
            topic_id: None,
            title: None,
            visibility: Visibility::Public,
            status: EpisodeStatus::PendingPublic,
            mask,
            quality: "standard".to_string(),
            storage_key: Some(storage_key),
            playback_url: None,
            duration_sec: None,
            size_bytes: None,
            waveform: None,
            is_live: false,
            live_session_id: None,
            status_changed_at: Some(now),
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Normalized peak amplitudes (0..=100) of the processed audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Waveform(pub Vec<u8>);

impl Waveform {
    pub fn peaks(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything the publish step writes onto a pending episode.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMedia {
    pub storage_key: StorageKey,
    pub playback_url: String,
    pub size_bytes: i64,
    pub duration_sec: i32,
    pub waveform: Waveform,
}

/// Episode row created when a live session is finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLiveEpisode {
    pub id: EpisodeId,
    pub author_id: UserId,
    pub topic_id: Option<TopicId>,
    pub title: Option<String>,
    pub mask: VoiceMask,
    pub duration_sec: Option<i32>,
    pub storage_key: StorageKey,
    pub live_session_id: LiveSessionId,
}
