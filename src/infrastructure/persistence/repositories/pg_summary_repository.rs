use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::instrument;
use uuid::Uuid;

use crate::application::ports::{RepositoryError, SummaryRepository};
use crate::domain::{EpisodeId, MoodScores, Summary};

pub struct PgSummaryRepository {
    pool: PgPool,
}

impl PgSummaryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    episode_id: Uuid,
    tldr: String,
    keywords: Vec<String>,
    mood: Json<MoodScores>,
}

#[async_trait]
impl SummaryRepository for PgSummaryRepository {
    #[instrument(skip(self, summary), fields(episode_id = %summary.episode_id))]
    async fn upsert(&self, summary: &Summary) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO summaries (episode_id, tldr, keywords, mood)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (episode_id) DO UPDATE
            SET tldr = EXCLUDED.tldr,
                keywords = EXCLUDED.keywords,
                mood = EXCLUDED.mood,
                updated_at = now()
            "#,
        )
        .bind(summary.episode_id.as_uuid())
        .bind(&summary.tldr)
        .bind(&summary.keywords)
        .bind(Json(&summary.mood))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(episode_id = %episode_id))]
    async fn get(&self, episode_id: EpisodeId) -> Result<Option<Summary>, RepositoryError> {
        let row = sqlx::query_as::<_, SummaryRow>(
            "SELECT episode_id, tldr, keywords, mood FROM summaries WHERE episode_id = $1",
        )
        .bind(episode_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Summary {
            episode_id: EpisodeId::from_uuid(r.episode_id),
            tldr: r.tldr,
            keywords: r.keywords,
            mood: r.mood.0,
        }))
    }
}
