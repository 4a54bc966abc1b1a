use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::application::ports::{LiveSessionRepository, RepositoryError};
use crate::domain::{
    EpisodeId, LiveSession, LiveSessionId, LiveSessionSnapshot, StorageKey, TopicId, UserId,
};

pub struct PgLiveSessionRepository {
    pool: PgPool,
}

impl PgLiveSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Session rows are written by the realtime service; exposed for seeding.
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub async fn insert(&self, session: &LiveSession) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO live_sessions (
                id, host_id, topic_id, room_name, title, mask, started_at, ended_at,
                recording_key, duration_sec
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(session.id.as_uuid())
        .bind(session.host_id.as_uuid())
        .bind(session.topic_id.map(|t| t.as_uuid()))
        .bind(&session.room_name)
        .bind(session.title.as_deref())
        .bind(session.mask.as_str())
        .bind(session.started_at)
        .bind(session.ended_at)
        .bind(session.recording_key.as_ref().map(StorageKey::as_str))
        .bind(session.duration_sec)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    id: Uuid,
    host_id: Uuid,
    topic_id: Option<Uuid>,
    room_name: String,
    title: Option<String>,
    mask: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    recording_key: Option<String>,
    duration_sec: Option<i32>,
    episode_id: Option<Uuid>,
}

#[async_trait]
impl LiveSessionRepository for PgLiveSessionRepository {
    #[instrument(skip(self), fields(session_id = %id))]
    async fn find_with_episode(
        &self,
        id: LiveSessionId,
    ) -> Result<Option<LiveSessionSnapshot>, RepositoryError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT ls.id, ls.host_id, ls.topic_id, ls.room_name, ls.title, ls.mask,
                   ls.started_at, ls.ended_at, ls.recording_key, ls.duration_sec,
                   e.id AS episode_id
            FROM live_sessions ls
            LEFT JOIN episodes e ON e.live_session_id = ls.id
            WHERE ls.id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(r) = row else {
            return Ok(None);
        };

        Ok(Some(LiveSessionSnapshot {
            session: LiveSession {
                id: LiveSessionId::from_uuid(r.id),
                host_id: UserId::from_uuid(r.host_id),
                topic_id: r.topic_id.map(TopicId::from_uuid),
                room_name: r.room_name,
                title: r.title,
                mask: r.mask.parse().map_err(RepositoryError::CorruptRow)?,
                started_at: r.started_at,
                ended_at: r.ended_at,
                recording_key: StorageKey::parse(r.recording_key.as_deref()),
                duration_sec: r.duration_sec,
            },
            episode_id: r.episode_id.map(EpisodeId::from_uuid),
        }))
    }

    #[instrument(skip(self), fields(session_id = %id, recording_key = %recording_key))]
    async fn update_recording(
        &self,
        id: LiveSessionId,
        recording_key: &StorageKey,
        duration_sec: Option<i32>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE live_sessions
            SET recording_key = COALESCE(NULLIF($2, ''), recording_key),
                duration_sec = COALESCE($3, duration_sec)
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(recording_key.as_str())
        .bind(duration_sec)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
