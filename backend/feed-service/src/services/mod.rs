//! Service layer for feed-service
//!
//! - feed: post/share creation with fan-out, home and trending feeds
//! - posts: single-post reads, owner mutations, likes and views
//! - follow: follow graph
//! - enrichment: read-time resolution of actors, places and media URLs

use std::sync::Arc;

use crate::clients::{IdentityLookup, MediaLocator, PlaceResolver};
use crate::db::{FeedStore, LikeStore, PostStore, RelationshipStore};

pub mod enrichment;
pub mod feed;
pub mod follow;
pub mod posts;

pub use enrichment::{Enricher, EnrichmentPolicy};
pub use feed::{CreatePostRequest, FeedPipeline};
pub use follow::FollowService;
pub use posts::PostService;

/// Stores and external clients the services are built from
#[derive(Clone)]
pub struct Collaborators {
    pub posts: Arc<dyn PostStore>,
    pub likes: Arc<dyn LikeStore>,
    pub feeds: Arc<dyn FeedStore>,
    pub relationships: Arc<dyn RelationshipStore>,
    pub identity: Arc<dyn IdentityLookup>,
    pub media: Arc<dyn MediaLocator>,
    pub places: Arc<dyn PlaceResolver>,
}

impl Collaborators {
    pub fn enricher(&self) -> Enricher {
        Enricher::new(
            self.identity.clone(),
            self.places.clone(),
            self.media.clone(),
            self.posts.clone(),
        )
    }
}
