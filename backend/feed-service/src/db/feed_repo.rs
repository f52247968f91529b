use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::Span;
use uuid::Uuid;

use super::FeedStore;
use crate::error::{db_error, AppError, DbOperation, Result};
use crate::models::{FeedClassification, FeedEntry, NewFeedEntry, Pagination, TrendingCandidate};

const ENTRY_COLUMNS: &str = "id, recipient_id, post_id, actor_id, classification, created_at, seq";

#[derive(sqlx::FromRow)]
struct FeedEntryRow {
    id: Uuid,
    recipient_id: Uuid,
    post_id: Uuid,
    actor_id: Uuid,
    classification: String,
    created_at: DateTime<Utc>,
    seq: i64,
}

impl TryFrom<FeedEntryRow> for FeedEntry {
    type Error = AppError;

    fn try_from(row: FeedEntryRow) -> Result<Self> {
        Ok(FeedEntry {
            id: row.id,
            recipient_id: row.recipient_id,
            post_id: row.post_id,
            actor_id: row.actor_id,
            classification: FeedClassification::parse(&row.classification)?,
            created_at: row.created_at,
            seq: row.seq,
        })
    }
}

/// PostgreSQL-backed `user_feeds` plus the trending aggregation over `post_likes`
#[derive(Clone)]
pub struct PgFeedStore {
    pool: PgPool,
    span: Span,
}

impl PgFeedStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_span(pool, tracing::info_span!("component", name = "feed_store"))
    }

    pub fn with_span(pool: PgPool, span: Span) -> Self {
        Self { pool, span }
    }
}

#[async_trait]
impl FeedStore for PgFeedStore {
    async fn insert_entry(&self, entry: NewFeedEntry) -> Result<FeedEntry> {
        let row = sqlx::query_as::<_, FeedEntryRow>(&format!(
            r#"
            INSERT INTO user_feeds (id, recipient_id, post_id, actor_id, classification)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(entry.recipient_id)
        .bind(entry.post_id)
        .bind(entry.actor_id)
        .bind(entry.classification.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Create, "insert feed entry"))?;

        row.try_into()
    }

    async fn list_entries(
        &self,
        recipient_id: Uuid,
        actor_ids: &[Uuid],
        page: Pagination,
    ) -> Result<Vec<FeedEntry>> {
        if actor_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, FeedEntryRow>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM user_feeds f
            WHERE f.recipient_id = $1
              AND f.actor_id = ANY($2)
              AND f.deleted_at IS NULL
              AND (
                (f.classification = 'REGULAR_POST' AND EXISTS (
                    SELECT 1 FROM posts p
                    WHERE p.id = f.post_id AND p.status = 'active' AND p.deleted_at IS NULL))
                OR
                (f.classification = 'SHARED_POST' AND EXISTS (
                    SELECT 1 FROM post_shares s
                    JOIN posts p ON p.id = s.post_id
                    WHERE s.id = f.post_id AND s.status = 'active' AND s.deleted_at IS NULL
                      AND p.status = 'active' AND p.deleted_at IS NULL))
              )
            ORDER BY f.created_at DESC, f.seq ASC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(recipient_id)
        .bind(actor_ids)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Get, "list feed entries"))?;

        rows.into_iter().map(FeedEntry::try_from).collect()
    }

    async fn soft_delete_entries_for(
        &self,
        post_id: Uuid,
        classification: FeedClassification,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE user_feeds
            SET deleted_at = NOW()
            WHERE post_id = $1 AND classification = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(post_id)
        .bind(classification.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Delete, "soft delete feed entries"))?;

        Ok(result.rows_affected())
    }

    async fn trending(&self, threshold: i64, page: Pagination) -> Result<Vec<TrendingCandidate>> {
        let rows = sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT p.id, COUNT(l.id) AS like_count
            FROM posts p
            LEFT JOIN post_likes l ON l.post_id = p.id AND l.deleted_at IS NULL
            WHERE p.status = 'active' AND p.deleted_at IS NULL
            GROUP BY p.id, p.created_at
            HAVING COUNT(l.id) >= $1
            ORDER BY like_count DESC, p.created_at DESC, p.id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(threshold)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Get, "select trending posts"))?;

        Ok(rows
            .into_iter()
            .map(|(post_id, like_count)| TrendingCandidate {
                post_id,
                like_count,
            })
            .collect())
    }
}
