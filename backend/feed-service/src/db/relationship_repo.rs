use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, Span};
use uuid::Uuid;

use super::RelationshipStore;
use crate::error::{db_error, AppError, DbOperation, Result};
use crate::models::{Pagination, Relationship};

/// PostgreSQL-backed `user_relationships`.
///
/// A partial unique index keeps at most one active row per
/// (followee, follower); soft-deleted rows are kept for restore.
#[derive(Clone)]
pub struct PgRelationshipStore {
    pool: PgPool,
    span: Span,
}

impl PgRelationshipStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_span(pool, tracing::info_span!("component", name = "relationship_store"))
    }

    pub fn with_span(pool: PgPool, span: Span) -> Self {
        Self { pool, span }
    }

    fn conflict(&self, followee_id: Uuid, follower_id: Uuid) -> AppError {
        debug!(parent: &self.span, %followee_id, %follower_id, "concurrent follow lost the race");
        AppError::AlreadyExists(format!("{} already follows {}", follower_id, followee_id))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl RelationshipStore for PgRelationshipStore {
    async fn find_active(
        &self,
        followee_id: Uuid,
        follower_id: Uuid,
    ) -> Result<Option<Relationship>> {
        sqlx::query_as::<_, Relationship>(
            r#"
            SELECT id, followee_id, follower_id, created_at, deleted_at
            FROM user_relationships
            WHERE followee_id = $1 AND follower_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(followee_id)
        .bind(follower_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Get, "select active relationship"))
    }

    async fn restore(&self, followee_id: Uuid, follower_id: Uuid) -> Result<Option<Relationship>> {
        let restored = sqlx::query_as::<_, Relationship>(
            r#"
            UPDATE user_relationships
            SET deleted_at = NULL
            WHERE id = (
                SELECT id FROM user_relationships
                WHERE followee_id = $1 AND follower_id = $2 AND deleted_at IS NOT NULL
                ORDER BY deleted_at DESC
                LIMIT 1
            )
            RETURNING id, followee_id, follower_id, created_at, deleted_at
            "#,
        )
        .bind(followee_id)
        .bind(follower_id)
        .fetch_optional(&self.pool)
        .await;

        match restored {
            Ok(row) => Ok(row),
            Err(err) if is_unique_violation(&err) => Err(self.conflict(followee_id, follower_id)),
            Err(err) => Err(db_error(&self.span, DbOperation::Update, "restore relationship")(err)),
        }
    }

    async fn insert(&self, followee_id: Uuid, follower_id: Uuid) -> Result<Relationship> {
        let inserted = sqlx::query_as::<_, Relationship>(
            r#"
            INSERT INTO user_relationships (id, followee_id, follower_id)
            VALUES ($1, $2, $3)
            RETURNING id, followee_id, follower_id, created_at, deleted_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(followee_id)
        .bind(follower_id)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(row) => Ok(row),
            Err(err) if is_unique_violation(&err) => Err(self.conflict(followee_id, follower_id)),
            Err(err) => Err(db_error(&self.span, DbOperation::Create, "insert relationship")(err)),
        }
    }

    async fn soft_delete(&self, followee_id: Uuid, follower_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE user_relationships
            SET deleted_at = NOW()
            WHERE followee_id = $1 AND follower_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(followee_id)
        .bind(follower_id)
        .execute(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Delete, "soft delete relationship"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_followers(&self, user_id: Uuid, page: Pagination) -> Result<Vec<Relationship>> {
        sqlx::query_as::<_, Relationship>(
            r#"
            SELECT id, followee_id, follower_id, created_at, deleted_at
            FROM user_relationships
            WHERE followee_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Get, "list followers"))
    }

    async fn list_followings(
        &self,
        user_id: Uuid,
        page: Pagination,
    ) -> Result<Vec<Relationship>> {
        sqlx::query_as::<_, Relationship>(
            r#"
            SELECT id, followee_id, follower_id, created_at, deleted_at
            FROM user_relationships
            WHERE follower_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Get, "list followings"))
    }

    async fn follower_ids_after(
        &self,
        user_id: Uuid,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT follower_id
            FROM user_relationships
            WHERE followee_id = $1 AND deleted_at IS NULL
              AND ($2::uuid IS NULL OR follower_id > $2)
            ORDER BY follower_id
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Get, "page follower ids"))
    }

    async fn followee_ids_after(
        &self,
        user_id: Uuid,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT followee_id
            FROM user_relationships
            WHERE follower_id = $1 AND deleted_at IS NULL
              AND ($2::uuid IS NULL OR followee_id > $2)
            ORDER BY followee_id
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Get, "page followee ids"))
    }
}
