mod audio_processing_service;
mod episode_transcode_handler;
mod job_dispatcher;
mod live_finalize_handler;
mod moderation_scanner;
mod retry_policy;
mod summary_deriver;

pub use audio_processing_service::{AudioProcessingError, AudioProcessingService, ProcessedAudio};
pub use episode_transcode_handler::{EpisodeTranscodeHandler, TranscodeError, TranscodeOutcome};
pub use job_dispatcher::{DispatcherConfig, JobDispatcher, Subscription, TickReport};
pub use live_finalize_handler::{FinalizeError, FinalizeOutcome, LiveFinalizeHandler};
pub use moderation_scanner::ModerationScanner;
pub use retry_policy::{RetryDecision, RetryPolicy};
pub use summary_deriver::SummaryDeriver;
