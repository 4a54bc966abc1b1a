use chrono::{DateTime, Utc};

use super::{EpisodeId, LiveSessionId, StorageKey, TopicId, UserId, VoiceMask};

#[derive(Debug, Clone, PartialEq)]
pub struct LiveSession {
    pub id: LiveSessionId,
    pub host_id: UserId,
    pub topic_id: Option<TopicId>,
    pub room_name: String,
    pub title: Option<String>,
    pub mask: VoiceMask,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub recording_key: Option<StorageKey>,
    pub duration_sec: Option<i32>,
}

impl LiveSession {
    pub fn is_live(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// A session together with the episode already created from it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSessionSnapshot {
    pub session: LiveSession,
    pub episode_id: Option<EpisodeId>,
}
