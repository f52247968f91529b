use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Media attached to a post, addressed by its storage key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFile {
    pub storage_key: String,
    pub media_type: String,
}

/// Media the author intends to upload alongside a new post
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaUpload {
    pub file_name: String,
    pub media_type: String,
}

/// Lifecycle of posts and shares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Active,
    Deleted,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "active" => Ok(Self::Active),
            "deleted" => Ok(Self::Deleted),
            other => Err(AppError::Internal(format!("unknown post status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub caption: String,
    pub media: Vec<MediaFile>,
    pub place_id: Option<String>,
    /// Resolved place text, filled the first time a read resolves `place_id`
    pub location: Option<String>,
    pub view_count: i64,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn is_active(&self) -> bool {
        self.status == PostStatus::Active && self.deleted_at.is_none()
    }
}

/// Insert payload for a post row
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: Uuid,
    pub caption: String,
    pub media: Vec<MediaFile>,
    pub place_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedPost {
    pub id: Uuid,
    /// Source post
    pub post_id: Uuid,
    /// Sharing user
    pub user_id: Uuid,
    pub caption: String,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SharedPost {
    pub fn is_active(&self) -> bool {
        self.status == PostStatus::Active && self.deleted_at.is_none()
    }
}

/// What a feed entry points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedClassification {
    RegularPost,
    SharedPost,
}

impl FeedClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegularPost => "REGULAR_POST",
            Self::SharedPost => "SHARED_POST",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "REGULAR_POST" => Ok(Self::RegularPost),
            "SHARED_POST" => Ok(Self::SharedPost),
            other => Err(AppError::Internal(format!(
                "unknown feed classification '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for FeedClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Materialized fan-out row: one per (recipient, post)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub id: Uuid,
    pub recipient_id: Uuid,
    /// Post id or share id depending on `classification`
    pub post_id: Uuid,
    /// Author of the post, or sharer of the share
    pub actor_id: Uuid,
    pub classification: FeedClassification,
    pub created_at: DateTime<Utc>,
    /// Insertion order, breaks `created_at` ties
    pub seq: i64,
}

#[derive(Debug, Clone)]
pub struct NewFeedEntry {
    pub recipient_id: Uuid,
    pub post_id: Uuid,
    pub actor_id: Uuid,
    pub classification: FeedClassification,
}

/// Follow edge. Active while `deleted_at` is empty.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub id: Uuid,
    pub followee_id: Uuid,
    pub follower_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Display profile resolved from the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorProfile {
    pub id: Uuid,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl ActorProfile {
    /// Stand-in used when the identity lookup fails under the placeholder policy
    pub fn unknown(id: Uuid) -> Self {
        Self {
            id,
            name: String::new(),
            avatar_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub vicinity: Option<String>,
}

impl Place {
    pub fn location_text(&self) -> String {
        match self.vicinity.as_deref().filter(|v| !v.is_empty()) {
            Some(vicinity) => format!("{}, {}", self.name, vicinity),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaUrl {
    pub url: String,
    pub media_type: String,
}

/// Read-side projection of a post
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedPost {
    pub id: Uuid,
    pub caption: String,
    pub media: Vec<MediaUrl>,
    pub location: Option<String>,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub actor: ActorProfile,
}

/// One item of a feed page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedFeedItem {
    /// Feed entry id; the post id for trending items
    pub id: Uuid,
    pub classification: FeedClassification,
    /// Post id for regular posts, share id for shared posts
    pub post_id: Uuid,
    pub caption: String,
    pub media: Vec<MediaUrl>,
    pub location: Option<String>,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub actor: ActorProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<EnrichedPost>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub like_count: Option<i64>,
}

/// 1-based page/size pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub size: u32,
}

impl Pagination {
    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size }
    }

    /// Reject page 0 and size 0, clamp size to `max_size`
    pub fn validated(self, max_size: u32) -> Result<Self> {
        if self.page == 0 {
            return Err(AppError::BadRequest("page must be >= 1".to_string()));
        }
        if self.size == 0 {
            return Err(AppError::BadRequest("size must be > 0".to_string()));
        }
        Ok(Self {
            page: self.page,
            size: self.size.min(max_size),
        })
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub items: Vec<EnrichedFeedItem>,
    pub page: u32,
    pub size: u32,
}

/// Post that met the trending threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendingCandidate {
    pub post_id: Uuid,
    pub like_count: i64,
}

/// Presigned upload slot for one media file, in request order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostUpload {
    pub storage_key: String,
    pub media_type: String,
    /// Absent when presigning failed for this file
    pub upload_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FanoutReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostOutcome {
    pub post: Post,
    pub uploads: Vec<PostUpload>,
    pub fanout: FanoutReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharePostOutcome {
    pub share: SharedPost,
    pub fanout: FanoutReport,
}
