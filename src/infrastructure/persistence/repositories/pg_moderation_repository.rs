use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use crate::application::ports::{ModerationRepository, RepositoryError};
use crate::domain::{FlagStatus, ModerationFlag, NewModerationFlag};

pub struct PgModerationRepository {
    pool: PgPool,
}

impl PgModerationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct FlagRow {
    id: i64,
    object_ref: String,
    severity: i16,
    reason: String,
    status: String,
    created_at: DateTime<Utc>,
}

#[async_trait]
impl ModerationRepository for PgModerationRepository {
    #[instrument(skip(self, flag), fields(object_ref = %flag.object_ref, reason = %flag.reason))]
    async fn insert_flag(&self, flag: &NewModerationFlag) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO moderation_flags (object_ref, severity, reason, status)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (object_ref, reason) DO NOTHING
            "#,
        )
        .bind(&flag.object_ref)
        .bind(flag.severity)
        .bind(&flag.reason)
        .bind(FlagStatus::Open.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list_for_object(&self, object_ref: &str) -> Result<Vec<ModerationFlag>, RepositoryError> {
        let rows = sqlx::query_as::<_, FlagRow>(
            r#"
            SELECT id, object_ref, severity, reason, status, created_at
            FROM moderation_flags
            WHERE object_ref = $1
            ORDER BY id
            "#,
        )
        .bind(object_ref)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(ModerationFlag {
                    id: r.id,
                    object_ref: r.object_ref,
                    severity: r.severity,
                    reason: r.reason,
                    status: r.status.parse().map_err(RepositoryError::CorruptRow)?,
                    created_at: r.created_at,
                })
            })
            .collect()
    }
}
