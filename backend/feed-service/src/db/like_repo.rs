use async_trait::async_trait;
use sqlx::PgPool;
use tracing::Span;
use uuid::Uuid;

use super::LikeStore;
use crate::error::{db_error, DbOperation, Result};

/// PostgreSQL-backed `post_likes`
#[derive(Clone)]
pub struct PgLikeStore {
    pool: PgPool,
    span: Span,
}

impl PgLikeStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_span(pool, tracing::info_span!("component", name = "like_store"))
    }

    pub fn with_span(pool: PgPool, span: Span) -> Self {
        Self { pool, span }
    }
}

#[async_trait]
impl LikeStore for PgLikeStore {
    async fn like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        // Partial unique index on active likes turns a duplicate into a no-op.
        let inserted = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO post_likes (id, post_id, user_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (post_id, user_id) WHERE deleted_at IS NULL DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(post_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Create, "insert post like"))?;

        Ok(inserted.is_some())
    }

    async fn unlike(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE post_likes
            SET deleted_at = NOW()
            WHERE post_id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Delete, "soft delete post like"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn like_count(&self, post_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM post_likes WHERE post_id = $1 AND deleted_at IS NULL",
        )
        .bind(post_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Get, "count post likes"))?;

        Ok(count)
    }
}
