use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use crate::db::StoreResult;
use crate::db::models::user_score::{UserId, UserScore};
use crate::db::repositories::ScoreStore;

/// Postgres-backed store.
///
/// Both mutations are a single `INSERT .. ON CONFLICT DO UPDATE` statement, so the existence check
/// and the write happen under the row lock Postgres takes for the conflicting key.
#[derive(Debug, Clone)]
pub struct PgScoreStore {
    pool: PgPool,
    seed: i64,
}

impl PgScoreStore {
    pub fn with_seed(pool: PgPool, seed: i64) -> Self {
        Self { pool, seed }
    }
}

#[async_trait]
impl ScoreStore for PgScoreStore {
    #[instrument(skip(self))]
    async fn get(&self, user_id: UserId) -> StoreResult<Option<UserScore>> {
        let score = sqlx::query_as::<_, UserScore>(
            r#"
            SELECT
                user_id,
                current_score,
                wins_today,
                losses_today,
                updated_at
            FROM user_score
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(score)
    }

    #[instrument(skip(self), fields(seed = self.seed))]
    async fn apply_delta(&self, user_id: UserId, delta: i64) -> StoreResult<i64> {
        let score = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO user_score (
                user_id,
                current_score,
                wins_today,
                losses_today,
                created_at,
                updated_at
            )
            VALUES (
                $1,
                $2::BIGINT + $3::BIGINT,
                CASE WHEN $3::BIGINT > 0 THEN 1 ELSE 0 END,
                CASE WHEN $3::BIGINT < 0 THEN 1 ELSE 0 END,
                NOW(),
                NOW()
            )
            ON CONFLICT (user_id)
            DO UPDATE SET
                current_score = user_score.current_score + $3::BIGINT,
                wins_today = user_score.wins_today
                    + CASE WHEN $3::BIGINT > 0 THEN 1 ELSE 0 END,
                losses_today = user_score.losses_today
                    + CASE WHEN $3::BIGINT < 0 THEN 1 ELSE 0 END,
                updated_at = NOW()
            RETURNING current_score
            "#,
        )
        .bind(user_id)
        .bind(self.seed)
        .bind(delta)
        .fetch_one(&self.pool)
        .await?;

        Ok(score)
    }

    #[instrument(skip(self))]
    async fn set_absolute(&self, user_id: UserId, value: i64) -> StoreResult<i64> {
        let score = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO user_score (
                user_id,
                current_score,
                wins_today,
                losses_today,
                created_at,
                updated_at
            )
            VALUES ($1, $2, 0, 0, NOW(), NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET
                current_score = EXCLUDED.current_score,
                wins_today = 0,
                losses_today = 0,
                updated_at = NOW()
            RETURNING current_score
            "#,
        )
        .bind(user_id)
        .bind(value)
        .fetch_one(&self.pool)
        .await?;

        Ok(score)
    }
}
