//! Feed assembly: write-time fan-out and read-time enrichment.
//!
//! `create_post` and `share_post` persist the row, then materialize one feed
//! entry per recipient (the actor plus every follower). Fan-out is best
//! effort: a failed insert is counted and logged, it never undoes the post.
//! `get_feed` and `get_trending_feed` read entries back and enrich them.

use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn, Span};
use uuid::Uuid;

use super::enrichment::{Enricher, EnrichmentPolicy, FeedSubject};
use super::Collaborators;
use crate::clients::MediaLocator;
use crate::config::FeedConfig;
use crate::db::{FeedStore, PostStore, RelationshipStore};
use crate::error::{AppError, Result};
use crate::metrics::feed::{
    FEED_FANOUT_TOTAL, FEED_PRESIGN_TOTAL, FEED_REQUEST_DURATION_SECONDS,
};
use crate::models::{
    CreatePostOutcome, FanoutReport, FeedClassification, FeedEntry, FeedPage, MediaFile,
    MediaUpload, NewFeedEntry, NewPost, Pagination, Post, PostUpload, SharePostOutcome,
};

const HOME_FEED: &str = "home";
const TRENDING_FEED: &str = "trending";

/// Input for [`FeedPipeline::create_post`]
#[derive(Debug, Clone, Default)]
pub struct CreatePostRequest {
    pub caption: String,
    pub media: Vec<MediaUpload>,
    pub place_id: Option<String>,
}

pub struct FeedPipeline {
    posts: Arc<dyn PostStore>,
    feeds: Arc<dyn FeedStore>,
    relationships: Arc<dyn RelationshipStore>,
    media: Arc<dyn MediaLocator>,
    enricher: Enricher,
    settings: FeedConfig,
    media_folder: String,
    span: Span,
}

impl FeedPipeline {
    pub fn new(deps: &Collaborators, settings: FeedConfig, media_folder: impl Into<String>) -> Self {
        Self {
            posts: deps.posts.clone(),
            feeds: deps.feeds.clone(),
            relationships: deps.relationships.clone(),
            media: deps.media.clone(),
            enricher: deps.enricher(),
            settings,
            media_folder: media_folder.into(),
            span: tracing::info_span!("component", name = "feed_pipeline"),
        }
    }

    pub fn settings(&self) -> &FeedConfig {
        &self.settings
    }

    /// Create a post, presign its media uploads and fan it out.
    ///
    /// Only the post insert is fatal. A failed presign leaves that upload
    /// without a URL; failed fan-out rows show up in the report.
    pub async fn create_post(
        &self,
        author_id: Uuid,
        request: CreatePostRequest,
    ) -> Result<CreatePostOutcome> {
        let caption = request.caption.trim().to_string();
        if caption.is_empty() && request.media.is_empty() {
            return Err(AppError::BadRequest(
                "a post needs a caption or at least one media file".to_string(),
            ));
        }
        if let Some(upload) = request.media.iter().find(|m| m.media_type.trim().is_empty()) {
            return Err(AppError::BadRequest(format!(
                "media type missing for '{}'",
                upload.file_name
            )));
        }
        let place_id = request
            .place_id
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        let media: Vec<MediaFile> = request
            .media
            .iter()
            .map(|upload| MediaFile {
                storage_key: storage_key(&self.media_folder, author_id, &upload.file_name),
                media_type: upload.media_type.clone(),
            })
            .collect();

        let uploads = self.presign_all(&media).await;

        let post = self
            .posts
            .create_post(NewPost {
                user_id: author_id,
                caption,
                media,
                place_id,
            })
            .await
            .map_err(|e| {
                error!(parent: &self.span, %author_id, error = %e, "post insert failed");
                e
            })?;

        let fanout = self
            .fan_out(author_id, post.id, FeedClassification::RegularPost)
            .await;

        info!(
            parent: &self.span,
            post_id = %post.id,
            %author_id,
            media = uploads.len(),
            delivered = fanout.delivered,
            failed = fanout.failed,
            "post created"
        );

        Ok(CreatePostOutcome {
            post,
            uploads,
            fanout,
        })
    }

    /// Share an active post and fan the share out to the sharer's followers
    pub async fn share_post(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        caption: Option<String>,
    ) -> Result<SharePostOutcome> {
        let original = self
            .posts
            .get_post(post_id)
            .await?
            .filter(Post::is_active)
            .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;

        let caption = caption.unwrap_or_default();
        let share = self
            .posts
            .create_share(user_id, original.id, caption.trim())
            .await?;

        let fanout = self
            .fan_out(user_id, share.id, FeedClassification::SharedPost)
            .await;

        info!(
            parent: &self.span,
            share_id = %share.id,
            %post_id,
            %user_id,
            delivered = fanout.delivered,
            failed = fanout.failed,
            "post shared"
        );

        Ok(SharePostOutcome { share, fanout })
    }

    /// Materialize one feed entry for the actor and one per follower.
    ///
    /// Followers are read in keyset pages of `fanout_batch_size`; each page is
    /// inserted with at most `fanout_concurrency` inserts in flight. A failed
    /// follower read stops paging; rows already written stay.
    pub async fn fan_out(
        &self,
        actor_id: Uuid,
        post_id: Uuid,
        classification: FeedClassification,
    ) -> FanoutReport {
        let mut report = self
            .deliver(actor_id, post_id, classification, vec![actor_id])
            .await;

        let batch = i64::from(self.settings.fanout_batch_size.max(1));
        let mut after: Option<Uuid> = None;
        loop {
            let followers = match self
                .relationships
                .follower_ids_after(actor_id, after, batch)
                .await
            {
                Ok(ids) => ids,
                Err(e) => {
                    error!(
                        parent: &self.span,
                        %actor_id,
                        %post_id,
                        error = %e,
                        "follower read failed, fan-out incomplete"
                    );
                    break;
                }
            };

            let Some(last) = followers.last().copied() else {
                break;
            };
            let full_page = followers.len() as i64 >= batch;
            after = Some(last);

            let page_report = self
                .deliver(actor_id, post_id, classification, followers)
                .await;
            report.delivered += page_report.delivered;
            report.failed += page_report.failed;

            if !full_page {
                break;
            }
        }

        report
    }

    async fn deliver(
        &self,
        actor_id: Uuid,
        post_id: Uuid,
        classification: FeedClassification,
        recipients: Vec<Uuid>,
    ) -> FanoutReport {
        let concurrency = self.settings.fanout_concurrency.max(1);
        let feeds = self.feeds.clone();

        let results: Vec<(Uuid, Result<FeedEntry>)> = stream::iter(recipients)
            .map(|recipient_id| {
                let feeds = feeds.clone();
                async move {
                    let result = feeds
                        .insert_entry(NewFeedEntry {
                            recipient_id,
                            post_id,
                            actor_id,
                            classification,
                        })
                        .await;
                    (recipient_id, result)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut report = FanoutReport::default();
        for (recipient_id, result) in results {
            match result {
                Ok(_) => {
                    FEED_FANOUT_TOTAL.with_label_values(&["delivered"]).inc();
                    report.delivered += 1;
                }
                Err(e) => {
                    FEED_FANOUT_TOTAL.with_label_values(&["failed"]).inc();
                    warn!(
                        parent: &self.span,
                        %recipient_id,
                        %post_id,
                        classification = %classification,
                        error = %e,
                        "feed entry insert failed"
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Presign every upload concurrently, keeping request order
    async fn presign_all(&self, media: &[MediaFile]) -> Vec<PostUpload> {
        let acl = self.media.default_acl().to_string();
        let requests = media.iter().map(|file| {
            let acl = acl.clone();
            async move {
                let upload_url = match self
                    .media
                    .presign_upload(&file.storage_key, &file.media_type, &acl)
                    .await
                {
                    Ok(url) => {
                        FEED_PRESIGN_TOTAL.with_label_values(&["ok"]).inc();
                        Some(url)
                    }
                    Err(e) => {
                        FEED_PRESIGN_TOTAL.with_label_values(&["error"]).inc();
                        warn!(parent: &self.span, key = %file.storage_key, error = %e, "presign failed");
                        None
                    }
                };
                PostUpload {
                    storage_key: file.storage_key.clone(),
                    media_type: file.media_type.clone(),
                    upload_url,
                }
            }
        });
        futures::future::join_all(requests).await
    }

    /// Home feed: entries from the requester and the users they follow
    pub async fn get_feed(&self, requester_id: Uuid, page: Pagination) -> Result<FeedPage> {
        let page = page.validated(self.settings.max_page_size)?;
        let _timer = FEED_REQUEST_DURATION_SECONDS
            .with_label_values(&[HOME_FEED])
            .start_timer();

        let actors = self.following_set(requester_id).await?;
        let entries = self
            .feeds
            .list_entries(requester_id, &actors, page)
            .await?;

        let subjects = self.load_subjects(&entries).await?;
        let degrade = self.settings.enrichment_policy == EnrichmentPolicy::Placeholder;

        let results = futures::future::join_all(entries.iter().map(|entry| {
            self.enricher.enrich_entry(
                HOME_FEED,
                entry.id,
                entry.classification,
                subjects.get(&(entry.classification, entry.post_id)).cloned(),
                entry.created_at,
                degrade,
            )
        }))
        .await;

        let items = self
            .enricher
            .collect(HOME_FEED, self.settings.enrichment_policy, results)?;

        Ok(FeedPage {
            items,
            page: page.page,
            size: page.size,
        })
    }

    /// Most-liked active posts with at least `threshold` likes
    pub async fn get_trending_feed(
        &self,
        page: Pagination,
        threshold: Option<i64>,
    ) -> Result<FeedPage> {
        let page = page.validated(self.settings.max_page_size)?;
        let threshold = threshold.unwrap_or(self.settings.trending_threshold);
        if threshold < 0 {
            return Err(AppError::BadRequest("threshold must be >= 0".to_string()));
        }
        let _timer = FEED_REQUEST_DURATION_SECONDS
            .with_label_values(&[TRENDING_FEED])
            .start_timer();

        let candidates = self.feeds.trending(threshold, page).await?;
        let ids: Vec<Uuid> = candidates.iter().map(|c| c.post_id).collect();
        let posts: HashMap<Uuid, Post> = self
            .posts
            .get_posts_by_ids(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let degrade = self.settings.enrichment_policy == EnrichmentPolicy::Placeholder;
        let results = futures::future::join_all(candidates.iter().map(|candidate| {
            let subject = posts.get(&candidate.post_id).cloned();
            async move {
                let created_at = subject
                    .as_ref()
                    .map(|p| p.created_at)
                    .unwrap_or_else(chrono::Utc::now);
                let mut item = self
                    .enricher
                    .enrich_entry(
                        TRENDING_FEED,
                        candidate.post_id,
                        FeedClassification::RegularPost,
                        subject.map(FeedSubject::Regular),
                        created_at,
                        degrade,
                    )
                    .await?;
                item.like_count = Some(candidate.like_count);
                Ok::<_, AppError>(item)
            }
        }))
        .await;

        let items = self
            .enricher
            .collect(TRENDING_FEED, self.settings.enrichment_policy, results)?;

        Ok(FeedPage {
            items,
            page: page.page,
            size: page.size,
        })
    }

    /// The requester plus every user they actively follow
    async fn following_set(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let batch = i64::from(self.settings.fanout_batch_size.max(1));
        let mut actors = vec![user_id];
        let mut after = None;
        loop {
            let ids = self
                .relationships
                .followee_ids_after(user_id, after, batch)
                .await?;
            let Some(last) = ids.last().copied() else {
                break;
            };
            let full_page = ids.len() as i64 >= batch;
            after = Some(last);
            actors.extend(ids);
            if !full_page {
                break;
            }
        }
        Ok(actors)
    }

    /// Load the posts and shares a page of entries points at, plus the
    /// source posts of those shares
    async fn load_subjects(
        &self,
        entries: &[FeedEntry],
    ) -> Result<HashMap<(FeedClassification, Uuid), FeedSubject>> {
        let mut post_ids = Vec::new();
        let mut share_ids = Vec::new();
        for entry in entries {
            match entry.classification {
                FeedClassification::RegularPost => post_ids.push(entry.post_id),
                FeedClassification::SharedPost => share_ids.push(entry.post_id),
            }
        }

        let (posts, shares) = futures::try_join!(
            self.posts.get_posts_by_ids(&post_ids),
            self.posts.get_shares_by_ids(&share_ids)
        )?;

        let source_ids: Vec<Uuid> = shares.iter().map(|s| s.post_id).collect();
        let sources: HashMap<Uuid, Post> = if source_ids.is_empty() {
            HashMap::new()
        } else {
            self.posts
                .get_posts_by_ids(&source_ids)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect()
        };

        let mut subjects = HashMap::with_capacity(posts.len() + shares.len());
        for post in posts {
            subjects.insert(
                (FeedClassification::RegularPost, post.id),
                FeedSubject::Regular(post),
            );
        }
        for share in shares {
            let original = sources.get(&share.post_id).cloned();
            subjects.insert(
                (FeedClassification::SharedPost, share.id),
                FeedSubject::Shared { share, original },
            );
        }
        Ok(subjects)
    }
}

/// `{folder}/{author}/{uuid}-{file name}` with the file name reduced to
/// `[A-Za-z0-9._-]`
pub fn storage_key(folder: &str, author_id: Uuid, file_name: &str) -> String {
    let base = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    let mut name: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.trim_matches(|c: char| c == '.' || c == '_').is_empty() {
        name = "file".to_string();
    }

    let object = format!("{}/{}-{}", author_id, Uuid::new_v4(), name);
    if folder.is_empty() {
        object
    } else {
        format!("{}/{}", folder, object)
    }
}
