/// Persistence layer
///
/// Each store is a trait so the feed pipeline can run against PostgreSQL in
/// production and against in-memory stores in tests. Every method is a single
/// statement: row-level atomicity only, nothing spans two calls.
use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    FeedClassification, FeedEntry, NewFeedEntry, NewPost, Pagination, Post, Relationship,
    SharedPost, TrendingCandidate,
};

pub mod feed_repo;
pub mod like_repo;
pub mod post_repo;
pub mod relationship_repo;

pub use feed_repo::PgFeedStore;
pub use like_repo::PgLikeStore;
pub use post_repo::PgPostStore;
pub use relationship_repo::PgRelationshipStore;

/// Posts and shared posts. Reads never return soft-deleted rows.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create_post(&self, post: NewPost) -> Result<Post>;

    async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>>;

    /// Active posts among `post_ids`, in no particular order
    async fn get_posts_by_ids(&self, post_ids: &[Uuid]) -> Result<Vec<Post>>;

    /// Returns `None` when the post is missing, deleted, or not owned by `user_id`
    async fn update_caption(&self, post_id: Uuid, user_id: Uuid, caption: &str)
        -> Result<Option<Post>>;

    /// Returns true if an active post owned by `user_id` was deleted
    async fn soft_delete_post(&self, post_id: Uuid, user_id: Uuid) -> Result<bool>;

    /// Atomic `view_count + 1`; returns the new count, `None` for unknown posts
    async fn increment_view_count(&self, post_id: Uuid) -> Result<Option<i64>>;

    /// Store resolved place text so later reads skip the geocoder
    async fn cache_location(&self, post_id: Uuid, location: &str) -> Result<()>;

    async fn create_share(&self, user_id: Uuid, post_id: Uuid, caption: &str)
        -> Result<SharedPost>;

    /// Active shares among `share_ids`, in no particular order
    async fn get_shares_by_ids(&self, share_ids: &[Uuid]) -> Result<Vec<SharedPost>>;

    async fn soft_delete_share(&self, share_id: Uuid, user_id: Uuid) -> Result<bool>;
}

/// Post likes. At most one active like per (post, user).
#[async_trait]
pub trait LikeStore: Send + Sync {
    /// Returns false when the user already likes the post
    async fn like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool>;

    /// Returns false when there was no active like
    async fn unlike(&self, post_id: Uuid, user_id: Uuid) -> Result<bool>;

    async fn like_count(&self, post_id: Uuid) -> Result<i64>;
}

/// Materialized feed entries and the trending aggregation
#[async_trait]
pub trait FeedStore: Send + Sync {
    async fn insert_entry(&self, entry: NewFeedEntry) -> Result<FeedEntry>;

    /// Entries for `recipient_id` whose actor is in `actor_ids` and whose
    /// post/share is still active, newest first, ties in insertion order
    async fn list_entries(
        &self,
        recipient_id: Uuid,
        actor_ids: &[Uuid],
        page: Pagination,
    ) -> Result<Vec<FeedEntry>>;

    /// Soft-delete every entry pointing at a post or share; returns rows touched
    async fn soft_delete_entries_for(
        &self,
        post_id: Uuid,
        classification: FeedClassification,
    ) -> Result<u64>;

    /// Active posts with at least `threshold` active likes, most liked first,
    /// then newest first
    async fn trending(&self, threshold: i64, page: Pagination) -> Result<Vec<TrendingCandidate>>;
}

/// Follow edges with soft-delete and restore
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    async fn find_active(&self, followee_id: Uuid, follower_id: Uuid)
        -> Result<Option<Relationship>>;

    /// Reactivate a soft-deleted edge for the pair, if one exists
    async fn restore(&self, followee_id: Uuid, follower_id: Uuid) -> Result<Option<Relationship>>;

    /// Insert a new active edge; `AlreadyExists` if one is already active
    async fn insert(&self, followee_id: Uuid, follower_id: Uuid) -> Result<Relationship>;

    /// Returns true if an active edge was soft-deleted
    async fn soft_delete(&self, followee_id: Uuid, follower_id: Uuid) -> Result<bool>;

    /// Active edges where `user_id` is the followee, newest first
    async fn list_followers(&self, user_id: Uuid, page: Pagination) -> Result<Vec<Relationship>>;

    /// Active edges where `user_id` is the follower, newest first
    async fn list_followings(&self, user_id: Uuid, page: Pagination)
        -> Result<Vec<Relationship>>;

    /// Keyset page of follower ids ordered by id, strictly after `after`
    async fn follower_ids_after(
        &self,
        user_id: Uuid,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Uuid>>;

    /// Keyset page of followee ids ordered by id, strictly after `after`
    async fn followee_ids_after(
        &self,
        user_id: Uuid,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Uuid>>;
}
