use std::sync::Arc;
use tracing::{info, Span};
use uuid::Uuid;

use crate::db::RelationshipStore;
use crate::error::{AppError, Result};
use crate::models::{Pagination, Relationship};

/// Follow graph mutations and listings.
///
/// At most one active edge exists per (followee, follower). Unfollowing soft
/// deletes the edge; following again reactivates it instead of adding a row.
#[derive(Clone)]
pub struct FollowService {
    relationships: Arc<dyn RelationshipStore>,
    max_page_size: u32,
    span: Span,
}

impl FollowService {
    pub fn new(relationships: Arc<dyn RelationshipStore>, max_page_size: u32) -> Self {
        Self {
            relationships,
            max_page_size,
            span: tracing::info_span!("component", name = "follow_service"),
        }
    }

    /// `follower_id` starts following `followee_id`
    pub async fn follow(&self, followee_id: Uuid, follower_id: Uuid) -> Result<Relationship> {
        if followee_id == follower_id {
            return Err(AppError::InvalidOperation(
                "users cannot follow themselves".to_string(),
            ));
        }

        if self
            .relationships
            .find_active(followee_id, follower_id)
            .await?
            .is_some()
        {
            return Err(AppError::AlreadyExists(format!(
                "user {} already follows {}",
                follower_id, followee_id
            )));
        }

        if let Some(restored) = self.relationships.restore(followee_id, follower_id).await? {
            info!(parent: &self.span, %followee_id, %follower_id, "follow restored");
            return Ok(restored);
        }

        let created = self.relationships.insert(followee_id, follower_id).await?;
        info!(parent: &self.span, %followee_id, %follower_id, "follow created");
        Ok(created)
    }

    pub async fn unfollow(&self, followee_id: Uuid, follower_id: Uuid) -> Result<()> {
        if !self
            .relationships
            .soft_delete(followee_id, follower_id)
            .await?
        {
            return Err(AppError::NotFound(format!(
                "user {} does not follow {}",
                follower_id, followee_id
            )));
        }
        info!(parent: &self.span, %followee_id, %follower_id, "follow removed");
        Ok(())
    }

    pub async fn get_followers(&self, user_id: Uuid, page: Pagination) -> Result<Vec<Relationship>> {
        let page = page.validated(self.max_page_size)?;
        self.relationships.list_followers(user_id, page).await
    }

    pub async fn get_followings(
        &self,
        user_id: Uuid,
        page: Pagination,
    ) -> Result<Vec<Relationship>> {
        let page = page.validated(self.max_page_size)?;
        self.relationships.list_followings(user_id, page).await
    }
}
