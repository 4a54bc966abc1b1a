mod episode;
mod episode_id;
mod episode_status;
mod job_message;
mod live_session;
mod live_session_id;
mod moderation_flag;
mod owner_ids;
mod storage_key;
mod summary;
mod visibility;
mod voice_mask;

pub use episode::{Episode, NewLiveEpisode, PublishedMedia, Waveform};
pub use episode_id::EpisodeId;
pub use episode_status::EpisodeStatus;
pub use job_message::{
    ATTEMPT_FIELD, DURATION_FIELD, EPISODE_ID_FIELD, FinalizeJob, JobDecodeError, JobFields,
    RECORDING_KEY_FIELD, SESSION_ID_FIELD, TranscodeJob,
};
pub use live_session::{LiveSession, LiveSessionSnapshot};
pub use live_session_id::LiveSessionId;
pub use moderation_flag::{
    FlagStatus, ModerationFlag, NewModerationFlag, SEVERITY_KEYWORD_HIT,
    SEVERITY_PROCESSING_FAILED,
};
pub use owner_ids::{TopicId, UserId};
pub use storage_key::StorageKey;
pub use summary::{MoodScores, Summary};
pub use visibility::Visibility;
pub use voice_mask::{PitchShift, VoiceMask};
