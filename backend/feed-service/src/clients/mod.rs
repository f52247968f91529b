//! External collaborators of the feed pipeline
//!
//! Identity lookup, media storage and geocoding sit behind traits; the HTTP
//! and S3 implementations live in the submodules.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{GeoLookupError, IdentityError, StorageError};
use crate::models::{ActorProfile, Place};

pub mod geocoding;
pub mod identity;
pub mod storage;

pub use geocoding::HttpPlaceResolver;
pub use identity::HttpIdentityLookup;
pub use storage::S3MediaLocator;

/// Resolves a user id to a display profile
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn get_profile(&self, user_id: Uuid) -> Result<ActorProfile, IdentityError>;
}

/// Storage keys to presigned upload URLs and public URLs
#[async_trait]
pub trait MediaLocator: Send + Sync {
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
        acl: &str,
    ) -> Result<String, StorageError>;

    /// ACL attached to uploads when the caller has no preference
    fn default_acl(&self) -> &str;

    fn public_url(&self, key: &str) -> String;
}

/// Place id to human-readable place
#[async_trait]
pub trait PlaceResolver: Send + Sync {
    async fn resolve(&self, place_id: &str) -> Result<Place, GeoLookupError>;
}
