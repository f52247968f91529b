use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, Span};
use uuid::Uuid;

use super::PostStore;
use crate::error::{db_error, AppError, DbOperation, Result};
use crate::models::{MediaFile, NewPost, Post, PostStatus, SharedPost};

const POST_COLUMNS: &str = "id, user_id, caption, media, place_id, location, view_count, status, \
                            created_at, updated_at, deleted_at";

const SHARE_COLUMNS: &str =
    "id, post_id, user_id, caption, status, created_at, updated_at, deleted_at";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    user_id: Uuid,
    caption: String,
    media: Json<Vec<MediaFile>>,
    place_id: Option<String>,
    location: Option<String>,
    view_count: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<PostRow> for Post {
    type Error = AppError;

    fn try_from(row: PostRow) -> Result<Self> {
        Ok(Post {
            id: row.id,
            user_id: row.user_id,
            caption: row.caption,
            media: row.media.0,
            place_id: row.place_id,
            location: row.location,
            view_count: row.view_count,
            status: PostStatus::parse(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ShareRow {
    id: Uuid,
    post_id: Uuid,
    user_id: Uuid,
    caption: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<ShareRow> for SharedPost {
    type Error = AppError;

    fn try_from(row: ShareRow) -> Result<Self> {
        Ok(SharedPost {
            id: row.id,
            post_id: row.post_id,
            user_id: row.user_id,
            caption: row.caption,
            status: PostStatus::parse(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

/// PostgreSQL-backed `posts` and `post_shares`
#[derive(Clone)]
pub struct PgPostStore {
    pool: PgPool,
    span: Span,
}

impl PgPostStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_span(pool, tracing::info_span!("component", name = "post_store"))
    }

    pub fn with_span(pool: PgPool, span: Span) -> Self {
        Self { pool, span }
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn create_post(&self, post: NewPost) -> Result<Post> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            INSERT INTO posts (id, user_id, caption, media, place_id, status, view_count)
            VALUES ($1, $2, $3, $4, $5, 'active', 0)
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(post.user_id)
        .bind(&post.caption)
        .bind(Json(&post.media))
        .bind(&post.place_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Create, "insert post"))?;

        debug!(parent: &self.span, post_id = %row.id, user_id = %row.user_id, "post created");
        row.try_into()
    }

    async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            WHERE id = $1 AND status = 'active' AND deleted_at IS NULL
            "#
        ))
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Get, "select post by id"))?;

        row.map(Post::try_from).transpose()
    }

    async fn get_posts_by_ids(&self, post_ids: &[Uuid]) -> Result<Vec<Post>> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            WHERE id = ANY($1) AND status = 'active' AND deleted_at IS NULL
            "#
        ))
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Get, "select posts by ids"))?;

        rows.into_iter().map(Post::try_from).collect()
    }

    async fn update_caption(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        caption: &str,
    ) -> Result<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            UPDATE posts
            SET caption = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND status = 'active' AND deleted_at IS NULL
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(post_id)
        .bind(user_id)
        .bind(caption)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Update, "update post caption"))?;

        row.map(Post::try_from).transpose()
    }

    async fn soft_delete_post(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET status = 'deleted', deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Delete, "soft delete post"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_view_count(&self, post_id: Uuid) -> Result<Option<i64>> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE posts
            SET view_count = view_count + 1
            WHERE id = $1 AND status = 'active' AND deleted_at IS NULL
            RETURNING view_count
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Update, "increment view count"))?;

        Ok(count)
    }

    async fn cache_location(&self, post_id: Uuid, location: &str) -> Result<()> {
        sqlx::query("UPDATE posts SET location = $2 WHERE id = $1 AND location IS NULL")
            .bind(post_id)
            .bind(location)
            .execute(&self.pool)
            .await
            .map_err(db_error(&self.span, DbOperation::Update, "cache post location"))?;

        Ok(())
    }

    async fn create_share(&self, user_id: Uuid, post_id: Uuid, caption: &str) -> Result<SharedPost> {
        let row = sqlx::query_as::<_, ShareRow>(&format!(
            r#"
            INSERT INTO post_shares (id, post_id, user_id, caption, status)
            VALUES ($1, $2, $3, $4, 'active')
            RETURNING {SHARE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(post_id)
        .bind(user_id)
        .bind(caption)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Create, "insert post share"))?;

        row.try_into()
    }

    async fn get_shares_by_ids(&self, share_ids: &[Uuid]) -> Result<Vec<SharedPost>> {
        if share_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ShareRow>(&format!(
            r#"
            SELECT {SHARE_COLUMNS}
            FROM post_shares
            WHERE id = ANY($1) AND status = 'active' AND deleted_at IS NULL
            "#
        ))
        .bind(share_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Get, "select shares by ids"))?;

        rows.into_iter().map(SharedPost::try_from).collect()
    }

    async fn soft_delete_share(&self, share_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE post_shares
            SET status = 'deleted', deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(share_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(db_error(&self.span, DbOperation::Delete, "soft delete post share"))?;

        Ok(result.rows_affected() > 0)
    }
}
