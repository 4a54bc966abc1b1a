mod audio_transcoder;
mod episode_repository;
mod job_queue;
mod live_session_repository;
mod media_store;
mod moderation_repository;
mod repository_error;
mod summary_repository;

pub use audio_transcoder::{AudioProbe, AudioTranscoder, TranscoderError};
pub use episode_repository::EpisodeRepository;
pub use job_queue::{JobQueue, QueueError, QueueMessage};
pub use live_session_repository::LiveSessionRepository;
pub use media_store::{ByteStream, MediaStore, MediaStoreError};
pub use moderation_repository::ModerationRepository;
pub use repository_error::RepositoryError;
pub use summary_repository::SummaryRepository;
