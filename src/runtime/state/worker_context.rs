use std::sync::Arc;

use uuid::Uuid;

use crate::application::ports::{
    AudioTranscoder, EpisodeRepository, JobQueue, LiveSessionRepository, MediaStore,
    MediaStoreError, ModerationRepository, QueueError, RepositoryError, SummaryRepository,
};
use crate::application::services::{
    AudioProcessingService, DispatcherConfig, EpisodeTranscodeHandler, JobDispatcher,
    LiveFinalizeHandler, ModerationScanner, RetryPolicy, Subscription,
};
use crate::infrastructure::audio::{FfmpegConfig, FfmpegTranscoder};
use crate::infrastructure::persistence::{
    InMemoryCatalog, PgEpisodeRepository, PgLiveSessionRepository, PgModerationRepository,
    PgSummaryRepository, create_pool, run_migrations,
};
use crate::infrastructure::queue::{InMemoryJobQueue, RedisStreamQueue};
use crate::infrastructure::storage::MediaStoreFactory;
use crate::runtime::config::{DatabaseProvider, QueueProvider, Settings};

/// Process-wide collaborators, built once at startup and shared by every
/// handler invocation.
#[derive(Clone)]
pub struct WorkerContext {
    pub settings: Settings,
    pub consumer: String,
    pub queue: Arc<dyn JobQueue>,
    pub media_store: Arc<dyn MediaStore>,
    pub transcoder: Arc<dyn AudioTranscoder>,
    pub episodes: Arc<dyn EpisodeRepository>,
    pub live_sessions: Arc<dyn LiveSessionRepository>,
    pub summaries: Arc<dyn SummaryRepository>,
    pub moderation: Arc<dyn ModerationRepository>,
}

struct Repositories {
    episodes: Arc<dyn EpisodeRepository>,
    live_sessions: Arc<dyn LiveSessionRepository>,
    summaries: Arc<dyn SummaryRepository>,
    moderation: Arc<dyn ModerationRepository>,
}

impl WorkerContext {
    pub async fn build(settings: Settings) -> Result<Self, ContextError> {
        let queue: Arc<dyn JobQueue> = match settings.queue.provider {
            QueueProvider::Redis => Arc::new(RedisStreamQueue::connect(&settings.queue.url).await?),
            QueueProvider::Memory => Arc::new(InMemoryJobQueue::new()),
        };

        let repositories = match settings.database.provider {
            DatabaseProvider::Postgres => {
                let pool =
                    create_pool(&settings.database.url, settings.database.max_connections).await?;
                if settings.database.run_migrations {
                    run_migrations(&pool).await?;
                }
                Repositories {
                    episodes: Arc::new(PgEpisodeRepository::new(pool.clone())),
                    live_sessions: Arc::new(PgLiveSessionRepository::new(pool.clone())),
                    summaries: Arc::new(PgSummaryRepository::new(pool.clone())),
                    moderation: Arc::new(PgModerationRepository::new(pool)),
                }
            }
            DatabaseProvider::Memory => {
                let catalog = Arc::new(InMemoryCatalog::new());
                Repositories {
                    episodes: catalog.clone(),
                    live_sessions: catalog.clone(),
                    summaries: catalog.clone(),
                    moderation: catalog,
                }
            }
        };

        let media_store = MediaStoreFactory::create(&settings.storage)?;
        let transcoder = Arc::new(FfmpegTranscoder::new(FfmpegConfig {
            ffmpeg_path: settings.transcoder.ffmpeg_path.clone(),
            ffprobe_path: settings.transcoder.ffprobe_path.clone(),
            opus_kbps: settings.transcoder.opus_kbps,
            sample_rate: settings.transcoder.sample_rate,
            rnnoise_model: settings.transcoder.rnnoise_model.clone(),
            waveform_points: settings.transcoder.waveform_points,
        }));

        Ok(Self {
            consumer: consumer_name(&settings.worker.consumer_prefix),
            settings,
            queue,
            media_store,
            transcoder,
            episodes: repositories.episodes,
            live_sessions: repositories.live_sessions,
            summaries: repositories.summaries,
            moderation: repositories.moderation,
        })
    }

    pub fn dispatcher(&self) -> JobDispatcher {
        let audio = Arc::new(AudioProcessingService::new(
            Arc::clone(&self.media_store),
            Arc::clone(&self.transcoder),
            self.settings.worker.scratch_path.clone(),
        ));

        let transcode = Arc::new(EpisodeTranscodeHandler::new(
            Arc::clone(&self.episodes),
            Arc::clone(&self.summaries),
            Arc::clone(&self.moderation),
            audio,
            ModerationScanner::new(&self.settings.moderation.banned_keywords),
            self.settings.publishing.cdn_base_url.clone(),
        ));

        let finalize = Arc::new(LiveFinalizeHandler::new(
            Arc::clone(&self.live_sessions),
            Arc::clone(&self.episodes),
            Arc::clone(&self.queue),
            self.settings.queue.transcode_topic.clone(),
        ));

        JobDispatcher::new(
            Arc::clone(&self.queue),
            transcode,
            finalize,
            self.dispatcher_config(),
        )
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        let queue = &self.settings.queue;
        DispatcherConfig {
            transcode: Subscription::new(&queue.transcode_topic, &queue.transcode_group),
            finalize: Subscription::new(&queue.finalize_topic, &queue.finalize_group),
            consumer: self.consumer.clone(),
            batch_size: self.settings.worker.batch_size.max(1),
            poll_interval: self.settings.worker.poll_interval(),
            reclaim_idle: self.settings.worker.reclaim_idle(),
            job_timeout: self.settings.worker.job_timeout(),
            transcode_retry: RetryPolicy::new(self.settings.retry.transcode_max_attempts),
            finalize_retry: RetryPolicy::new(self.settings.retry.finalize_max_attempts),
        }
    }
}

/// Competing consumers need distinct names within a group.
fn consumer_name(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..8])
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("queue: {0}")]
    Queue(#[from] QueueError),
    #[error("database: {0}")]
    Repository(#[from] RepositoryError),
    #[error("media store: {0}")]
    Storage(#[from] MediaStoreError),
}
