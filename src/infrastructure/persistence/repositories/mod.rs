mod in_memory_catalog;
mod pg_episode_repository;
mod pg_live_session_repository;
mod pg_moderation_repository;
mod pg_summary_repository;

pub use in_memory_catalog::InMemoryCatalog;
pub use pg_episode_repository::PgEpisodeRepository;
pub use pg_live_session_repository::PgLiveSessionRepository;
pub use pg_moderation_repository::PgModerationRepository;
pub use pg_summary_repository::PgSummaryRepository;
