/// Post service - single-post reads and owner mutations, likes, views
use std::sync::Arc;
use tracing::{info, Span};
use uuid::Uuid;

use super::enrichment::Enricher;
use super::Collaborators;
use crate::db::{FeedStore, LikeStore, PostStore};
use crate::error::{AppError, Result};
use crate::models::{EnrichedPost, FeedClassification, Post};

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostStore>,
    likes: Arc<dyn LikeStore>,
    feeds: Arc<dyn FeedStore>,
    enricher: Enricher,
    span: Span,
}

impl PostService {
    pub fn new(deps: &Collaborators) -> Self {
        Self {
            posts: deps.posts.clone(),
            likes: deps.likes.clone(),
            feeds: deps.feeds.clone(),
            enricher: deps.enricher(),
            span: tracing::info_span!("component", name = "post_service"),
        }
    }

    /// Get an enriched post. Any enrichment failure fails the call.
    pub async fn get_post_by_id(&self, post_id: Uuid) -> Result<EnrichedPost> {
        let post = self.active_post(post_id).await?;
        self.enricher.enrich_post("post", &post, false).await
    }

    /// Replace the caption of a post owned by `user_id`
    pub async fn update_caption(&self, post_id: Uuid, user_id: Uuid, caption: &str) -> Result<Post> {
        let post = self.active_post(post_id).await?;
        if post.user_id != user_id {
            return Err(AppError::Forbidden(format!(
                "post {} belongs to another user",
                post_id
            )));
        }
        let caption = caption.trim();
        if caption.is_empty() && post.media.is_empty() {
            return Err(AppError::BadRequest(
                "caption cannot be empty on a post without media".to_string(),
            ));
        }

        self.posts
            .update_caption(post_id, user_id, caption)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))
    }

    /// Soft-delete a post and every feed entry pointing at it
    pub async fn delete_post(&self, post_id: Uuid, user_id: Uuid) -> Result<()> {
        let post = self.active_post(post_id).await?;
        if post.user_id != user_id {
            return Err(AppError::Forbidden(format!(
                "post {} belongs to another user",
                post_id
            )));
        }
        if !self.posts.soft_delete_post(post_id, user_id).await? {
            return Err(AppError::NotFound(format!("post {}", post_id)));
        }

        let entries = self
            .feeds
            .soft_delete_entries_for(post_id, FeedClassification::RegularPost)
            .await?;
        info!(parent: &self.span, %post_id, %user_id, entries, "post deleted");
        Ok(())
    }

    /// Soft-delete a share owned by `user_id` and its feed entries
    pub async fn delete_share(&self, share_id: Uuid, user_id: Uuid) -> Result<()> {
        if !self.posts.soft_delete_share(share_id, user_id).await? {
            return Err(AppError::NotFound(format!("share {}", share_id)));
        }
        let entries = self
            .feeds
            .soft_delete_entries_for(share_id, FeedClassification::SharedPost)
            .await?;
        info!(parent: &self.span, %share_id, %user_id, entries, "share deleted");
        Ok(())
    }

    /// Record one view; returns the new count
    pub async fn increment_view_count(&self, post_id: Uuid) -> Result<i64> {
        self.posts
            .increment_view_count(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))
    }

    /// Like a post; returns the like count afterwards
    pub async fn like(&self, post_id: Uuid, user_id: Uuid) -> Result<i64> {
        self.active_post(post_id).await?;
        if !self.likes.like(post_id, user_id).await? {
            return Err(AppError::InvalidOperation(format!(
                "post {} is already liked",
                post_id
            )));
        }
        self.likes.like_count(post_id).await
    }

    /// Remove a like; returns the like count afterwards
    pub async fn unlike(&self, post_id: Uuid, user_id: Uuid) -> Result<i64> {
        if !self.likes.unlike(post_id, user_id).await? {
            return Err(AppError::InvalidOperation(format!(
                "post {} is not liked",
                post_id
            )));
        }
        self.likes.like_count(post_id).await
    }

    async fn active_post(&self, post_id: Uuid) -> Result<Post> {
        self.posts
            .get_post(post_id)
            .await?
            .filter(Post::is_active)
            .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))
    }
}
