mod pg_pool;
mod repositories;

pub use repositories::InMemoryCatalog;
pub use repositories::PgEpisodeRepository;
pub use repositories::PgLiveSessionRepository;
pub use repositories::PgModerationRepository;
pub use repositories::PgSummaryRepository;

pub use pg_pool::{create_pool, run_migrations};
