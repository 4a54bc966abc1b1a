use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::instrument;
use uuid::Uuid;

use crate::application::ports::{EpisodeRepository, RepositoryError};
use crate::domain::{
    Episode, EpisodeId, EpisodeStatus, LiveSessionId, NewLiveEpisode, PublishedMedia, StorageKey,
    TopicId, UserId, Waveform,
};

const EPISODE_COLUMNS: &str = r#"
    id, author_id, topic_id, title, visibility, status, mask, quality, storage_key,
    audio_url, duration_sec, size_bytes, waveform_json, is_live, live_session_id,
    status_changed_at, published_at, created_at, updated_at
"#;

pub struct PgEpisodeRepository {
    pool: PgPool,
}

impl PgEpisodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a fully formed row. Upload handlers own this in production;
    /// the worker only uses it for seeding.
    #[instrument(skip(self, episode), fields(episode_id = %episode.id))]
    pub async fn insert(&self, episode: &Episode) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO episodes (
                id, author_id, topic_id, title, visibility, status, mask, quality, storage_key,
                audio_url, duration_sec, size_bytes, waveform_json, is_live, live_session_id,
                status_changed_at, published_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(episode.id.as_uuid())
        .bind(episode.author_id.as_uuid())
        .bind(episode.topic_id.map(|t| t.as_uuid()))
        .bind(episode.title.as_deref())
        .bind(episode.visibility.as_str())
        .bind(episode.status.as_str())
        .bind(episode.mask.as_str())
        .bind(&episode.quality)
        .bind(episode.storage_key.as_ref().map(StorageKey::as_str))
        .bind(episode.playback_url.as_deref())
        .bind(episode.duration_sec)
        .bind(episode.size_bytes)
        .bind(episode.waveform.as_ref().map(Json))
        .bind(episode.is_live)
        .bind(episode.live_session_id.map(|s| s.as_uuid()))
        .bind(episode.status_changed_at)
        .bind(episode.published_at)
        .bind(episode.created_at)
        .bind(episode.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct EpisodeRow {
    id: Uuid,
    author_id: Uuid,
    topic_id: Option<Uuid>,
    title: Option<String>,
    visibility: String,
    status: String,
    mask: String,
    quality: String,
    storage_key: Option<String>,
    audio_url: Option<String>,
    duration_sec: Option<i32>,
    size_bytes: Option<i64>,
    waveform_json: Option<Json<Waveform>>,
    is_live: bool,
    live_session_id: Option<Uuid>,
    status_changed_at: Option<DateTime<Utc>>,
    published_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EpisodeRow> for Episode {
    type Error = RepositoryError;

    fn try_from(r: EpisodeRow) -> Result<Self, Self::Error> {
        Ok(Episode {
            id: EpisodeId::from_uuid(r.id),
            author_id: UserId::from_uuid(r.author_id),
            topic_id: r.topic_id.map(TopicId::from_uuid),
            title: r.title,
            visibility: r.visibility.parse().map_err(RepositoryError::CorruptRow)?,
            status: r
                .status
                .parse::<EpisodeStatus>()
                .map_err(RepositoryError::CorruptRow)?,
            mask: r.mask.parse().map_err(RepositoryError::CorruptRow)?,
            quality: r.quality,
            storage_key: StorageKey::parse(r.storage_key.as_deref()),
            playback_url: r.audio_url,
            duration_sec: r.duration_sec,
            size_bytes: r.size_bytes,
            waveform: r.waveform_json.map(|Json(w)| w),
            is_live: r.is_live,
            live_session_id: r.live_session_id.map(LiveSessionId::from_uuid),
            status_changed_at: r.status_changed_at,
            published_at: r.published_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[async_trait]
impl EpisodeRepository for PgEpisodeRepository {
    #[instrument(skip(self), fields(episode_id = %id))]
    async fn get_by_id(&self, id: EpisodeId) -> Result<Option<Episode>, RepositoryError> {
        let row = sqlx::query_as::<_, EpisodeRow>(&format!(
            "SELECT {} FROM episodes WHERE id = $1",
            EPISODE_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Episode::try_from).transpose()
    }

    #[instrument(skip(self), fields(episode_id = %id))]
    async fn find_pending_public(&self, id: EpisodeId) -> Result<Option<Episode>, RepositoryError> {
        let row = sqlx::query_as::<_, EpisodeRow>(&format!(
            "SELECT {} FROM episodes WHERE id = $1 AND status = $2",
            EPISODE_COLUMNS
        ))
        .bind(id.as_uuid())
        .bind(EpisodeStatus::PendingPublic.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Episode::try_from).transpose()
    }

    #[instrument(skip(self, media), fields(episode_id = %id, storage_key = %media.storage_key))]
    async fn publish(&self, id: EpisodeId, media: &PublishedMedia) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE episodes
            SET status = $2,
                audio_url = $3,
                storage_key = $4,
                size_bytes = $5,
                waveform_json = $6,
                duration_sec = $7,
                status_changed_at = now(),
                updated_at = now(),
                published_at = COALESCE(published_at, now())
            WHERE id = $1 AND status = $8
            "#,
        )
        .bind(id.as_uuid())
        .bind(EpisodeStatus::Public.as_str())
        .bind(&media.playback_url)
        .bind(media.storage_key.as_str())
        .bind(media.size_bytes)
        .bind(Json(&media.waveform))
        .bind(media.duration_sec)
        .bind(EpisodeStatus::PendingPublic.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(episode_id = %id))]
    async fn mark_deleted(&self, id: EpisodeId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE episodes
            SET status = $2, status_changed_at = now(), updated_at = now()
            WHERE id = $1 AND status IN ($3, $4)
            "#,
        )
        .bind(id.as_uuid())
        .bind(EpisodeStatus::Deleted.as_str())
        .bind(EpisodeStatus::PendingUpload.as_str())
        .bind(EpisodeStatus::PendingPublic.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, episode), fields(episode_id = %episode.id, session_id = %episode.live_session_id))]
    async fn create_from_live_session(
        &self,
        episode: &NewLiveEpisode,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO episodes (
                id, author_id, topic_id, visibility, status, title, duration_sec,
                storage_key, mask, is_live, live_session_id, status_changed_at
            )
            VALUES ($1, $2, $3, 'public', 'pending_public', $4, $5, $6, $7, true, $8, now())
            ON CONFLICT (live_session_id) DO NOTHING
            "#,
        )
        .bind(episode.id.as_uuid())
        .bind(episode.author_id.as_uuid())
        .bind(episode.topic_id.map(|t| t.as_uuid()))
        .bind(episode.title.as_deref())
        .bind(episode.duration_sec)
        .bind(episode.storage_key.as_str())
        .bind(episode.mask.as_str())
        .bind(episode.live_session_id.as_uuid())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
