//! Read-time enrichment of posts and feed entries.
//!
//! A persisted row becomes an [`EnrichedPost`] / [`EnrichedFeedItem`] by
//! resolving its place id to location text, turning storage keys into public
//! URLs and resolving the actor's profile. What happens when one of those
//! lookups fails is decided by [`EnrichmentPolicy`].

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn, Span};
use uuid::Uuid;

use crate::clients::{IdentityLookup, MediaLocator, PlaceResolver};
use crate::db::PostStore;
use crate::error::{AppError, GeoLookupError, IdentityError, Result};
use crate::metrics::feed::FEED_ENRICHMENT_FAILURES_TOTAL;
use crate::models::{
    ActorProfile, EnrichedFeedItem, EnrichedPost, FeedClassification, MediaUrl, Post, SharedPost,
};

/// What a feed read does with a row whose enrichment failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentPolicy {
    /// Remove the row; the page may come back shorter than requested
    Drop,
    /// Keep the row with an unknown actor and no location. Rows whose post
    /// disappeared are still dropped.
    Placeholder,
    /// Fail the whole page with the first error
    FailPage,
}

impl EnrichmentPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::Placeholder => "placeholder",
            Self::FailPage => "fail_page",
        }
    }
}

impl FromStr for EnrichmentPolicy {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "placeholder" => Ok(Self::Placeholder),
            "fail_page" | "fail-page" => Ok(Self::FailPage),
            other => Err(format!(
                "unknown enrichment policy '{}' (expected drop, placeholder or fail_page)",
                other
            )),
        }
    }
}

/// The row a feed entry resolved to
#[derive(Debug, Clone)]
pub enum FeedSubject {
    Regular(Post),
    Shared {
        share: SharedPost,
        /// `None` when the source post is gone
        original: Option<Post>,
    },
}

#[derive(Clone)]
pub struct Enricher {
    identity: Arc<dyn IdentityLookup>,
    places: Arc<dyn PlaceResolver>,
    media: Arc<dyn MediaLocator>,
    posts: Arc<dyn PostStore>,
    span: Span,
}

impl Enricher {
    pub fn new(
        identity: Arc<dyn IdentityLookup>,
        places: Arc<dyn PlaceResolver>,
        media: Arc<dyn MediaLocator>,
        posts: Arc<dyn PostStore>,
    ) -> Self {
        Self {
            identity,
            places,
            media,
            posts,
            span: tracing::info_span!("component", name = "enricher"),
        }
    }

    /// Enrich one post. With `degrade` set, a failed place or actor lookup
    /// yields no location / an unknown actor instead of an error. `feed`
    /// labels the placeholder metric.
    pub async fn enrich_post(
        &self,
        feed: &'static str,
        post: &Post,
        degrade: bool,
    ) -> Result<EnrichedPost> {
        let (location, actor) = futures::join!(
            self.location(post, degrade),
            self.actor(feed, post.user_id, degrade)
        );

        Ok(EnrichedPost {
            id: post.id,
            caption: post.caption.clone(),
            media: self.media_urls(post),
            location: location?,
            view_count: post.view_count,
            created_at: post.created_at,
            actor: actor?,
        })
    }

    /// Enrich one feed row. `subject` is `None` when the referenced post or
    /// share could not be loaded.
    pub async fn enrich_entry(
        &self,
        feed: &'static str,
        entry_id: Uuid,
        classification: FeedClassification,
        subject: Option<FeedSubject>,
        created_at: chrono::DateTime<chrono::Utc>,
        degrade: bool,
    ) -> Result<EnrichedFeedItem> {
        match subject {
            Some(FeedSubject::Regular(post)) => {
                let enriched = self.enrich_post(feed, &post, degrade).await?;
                Ok(EnrichedFeedItem {
                    id: entry_id,
                    classification,
                    post_id: post.id,
                    caption: enriched.caption,
                    media: enriched.media,
                    location: enriched.location,
                    view_count: enriched.view_count,
                    created_at,
                    actor: enriched.actor,
                    original: None,
                    like_count: None,
                })
            }
            Some(FeedSubject::Shared {
                share,
                original: Some(original),
            }) => {
                let (actor, original) = futures::join!(
                    self.actor(feed, share.user_id, degrade),
                    self.enrich_post(feed, &original, degrade)
                );
                let original = original?;
                Ok(EnrichedFeedItem {
                    id: entry_id,
                    classification,
                    post_id: share.id,
                    caption: share.caption,
                    media: Vec::new(),
                    location: None,
                    view_count: original.view_count,
                    created_at,
                    actor: actor?,
                    original: Some(original),
                    like_count: None,
                })
            }
            Some(FeedSubject::Shared { share, original: None }) => Err(AppError::NotFound(
                format!("original post {} of share {}", share.post_id, share.id),
            )),
            None => Err(AppError::NotFound(format!("feed entry {} target", entry_id))),
        }
    }

    /// Apply `policy` to per-row enrichment results, keeping row order
    pub fn collect(
        &self,
        feed: &'static str,
        policy: EnrichmentPolicy,
        results: Vec<Result<EnrichedFeedItem>>,
    ) -> Result<Vec<EnrichedFeedItem>> {
        let mut items = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(item) => items.push(item),
                Err(err) if policy == EnrichmentPolicy::FailPage => {
                    FEED_ENRICHMENT_FAILURES_TOTAL
                        .with_label_values(&[feed, "failed_page"])
                        .inc();
                    warn!(parent: &self.span, feed, error = %err, "enrichment failed, failing page");
                    return Err(err);
                }
                Err(err) => {
                    FEED_ENRICHMENT_FAILURES_TOTAL
                        .with_label_values(&[feed, "dropped"])
                        .inc();
                    warn!(parent: &self.span, feed, error = %err, "enrichment failed, dropping row");
                }
            }
        }
        Ok(items)
    }

    fn media_urls(&self, post: &Post) -> Vec<MediaUrl> {
        post.media
            .iter()
            .map(|file| MediaUrl {
                url: self.media.public_url(&file.storage_key),
                media_type: file.media_type.clone(),
            })
            .collect()
    }

    async fn location(&self, post: &Post, degrade: bool) -> Result<Option<String>> {
        if let Some(cached) = &post.location {
            return Ok(Some(cached.clone()));
        }
        let Some(place_id) = post.place_id.as_deref() else {
            return Ok(None);
        };

        match self.places.resolve(place_id).await {
            Ok(place) => {
                let text = place.location_text();
                if let Err(err) = self.posts.cache_location(post.id, &text).await {
                    debug!(parent: &self.span, post_id = %post.id, error = %err, "location cache write failed");
                }
                Ok(Some(text))
            }
            Err(err) => {
                self.note_geo_failure(post.id, place_id, &err);
                if degrade {
                    Ok(None)
                } else {
                    Err(err.into())
                }
            }
        }
    }

    async fn actor(&self, feed: &'static str, user_id: Uuid, degrade: bool) -> Result<ActorProfile> {
        match self.identity.get_profile(user_id).await {
            Ok(profile) => Ok(profile),
            Err(err) => {
                self.note_identity_failure(user_id, &err);
                if degrade {
                    FEED_ENRICHMENT_FAILURES_TOTAL
                        .with_label_values(&[feed, "placeholder"])
                        .inc();
                    Ok(ActorProfile::unknown(user_id))
                } else {
                    Err(err.into())
                }
            }
        }
    }

    fn note_identity_failure(&self, user_id: Uuid, err: &IdentityError) {
        match err {
            IdentityError::NotFound(_) => {
                debug!(parent: &self.span, %user_id, "actor profile not found")
            }
            IdentityError::RateLimited
            | IdentityError::Unavailable(_)
            | IdentityError::Decode(_) => {
                warn!(parent: &self.span, %user_id, error = %err, "actor lookup failed")
            }
        }
    }

    fn note_geo_failure(&self, post_id: Uuid, place_id: &str, err: &GeoLookupError) {
        match err {
            GeoLookupError::NotFound(_) => {
                debug!(parent: &self.span, %post_id, place_id, "place not found")
            }
            GeoLookupError::QuotaExceeded
            | GeoLookupError::Request(_)
            | GeoLookupError::Decode(_) => {
                warn!(parent: &self.span, %post_id, place_id, error = %err, "place lookup failed")
            }
        }
    }
}
