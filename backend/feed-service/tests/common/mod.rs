//! In-memory stores and fake collaborators for integration tests
//!
//! `MemoryStore` implements every store trait over plain vectors with the same
//! visibility rules as the PostgreSQL stores. The fakes record calls and can be
//! told to fail for specific ids.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use feed_service::clients::{IdentityLookup, MediaLocator, PlaceResolver};
use feed_service::config::FeedConfig;
use feed_service::db::{FeedStore, LikeStore, PostStore, RelationshipStore};
use feed_service::error::{
    AppError, DbOperation, GeoLookupError, IdentityError, Result, StorageError,
};
use feed_service::models::{
    ActorProfile, FeedClassification, FeedEntry, NewFeedEntry, NewPost, Pagination, Place, Post,
    PostStatus, Relationship, SharedPost, TrendingCandidate,
};
use feed_service::services::{EnrichmentPolicy, FeedPipeline, FollowService, PostService};
use feed_service::Collaborators;

#[derive(Debug, Clone)]
struct LikeRow {
    post_id: Uuid,
    user_id: Uuid,
    active: bool,
}

#[derive(Debug, Clone)]
struct EntryRow {
    entry: FeedEntry,
    deleted: bool,
}

#[derive(Default)]
struct Tables {
    posts: Vec<Post>,
    shares: Vec<SharedPost>,
    likes: Vec<LikeRow>,
    entries: Vec<EntryRow>,
    relationships: Vec<Relationship>,
    next_seq: i64,
}

/// Every store trait over shared in-memory tables
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    /// Fixed timestamp for new rows; `None` uses the wall clock
    clock: Arc<Mutex<Option<DateTime<Utc>>>>,
    failing_recipients: Arc<Mutex<HashSet<Uuid>>>,
    fail_follower_reads: Arc<AtomicBool>,
    fail_post_insert: Arc<AtomicBool>,
    location_writes: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp every new row with `at` until changed
    pub fn set_clock(&self, at: DateTime<Utc>) {
        *self.clock.lock().unwrap() = Some(at);
    }

    pub fn advance_clock(&self, by: Duration) {
        let mut clock = self.clock.lock().unwrap();
        let now = clock.unwrap_or_else(Utc::now);
        *clock = Some(now + by);
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.lock().unwrap().unwrap_or_else(Utc::now)
    }

    /// Feed inserts for `recipient_id` fail until cleared
    pub fn fail_inserts_for(&self, recipient_id: Uuid) {
        self.failing_recipients.lock().unwrap().insert(recipient_id);
    }

    pub fn fail_follower_reads(&self, fail: bool) {
        self.fail_follower_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_post_insert(&self, fail: bool) {
        self.fail_post_insert.store(fail, Ordering::SeqCst);
    }

    /// Active feed entries of `recipient_id`, any order
    pub fn entries_for(&self, recipient_id: Uuid) -> Vec<FeedEntry> {
        self.tables
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter(|row| !row.deleted && row.entry.recipient_id == recipient_id)
            .map(|row| row.entry.clone())
            .collect()
    }

    /// Active feed entries pointing at `post_id`
    pub fn entries_pointing_at(&self, post_id: Uuid) -> Vec<FeedEntry> {
        self.tables
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter(|row| !row.deleted && row.entry.post_id == post_id)
            .map(|row| row.entry.clone())
            .collect()
    }

    pub fn post_count(&self) -> usize {
        self.tables.lock().unwrap().posts.len()
    }

    /// All relationship rows for the pair, active or not
    pub fn relationship_rows(&self, followee_id: Uuid, follower_id: Uuid) -> Vec<Relationship> {
        self.tables
            .lock()
            .unwrap()
            .relationships
            .iter()
            .filter(|r| r.followee_id == followee_id && r.follower_id == follower_id)
            .cloned()
            .collect()
    }

    pub fn stored_post(&self, post_id: Uuid) -> Option<Post> {
        self.tables
            .lock()
            .unwrap()
            .posts
            .iter()
            .find(|p| p.id == post_id)
            .cloned()
    }

    pub fn location_writes(&self) -> usize {
        self.location_writes.load(Ordering::SeqCst)
    }

    /// Insert an active follow edge directly
    pub fn seed_follow(&self, followee_id: Uuid, follower_id: Uuid) {
        let now = self.now();
        self.tables.lock().unwrap().relationships.push(Relationship {
            id: Uuid::new_v4(),
            followee_id,
            follower_id,
            created_at: now,
            deleted_at: None,
        });
    }

    /// Insert active likes from `count` distinct users
    pub fn seed_likes(&self, post_id: Uuid, count: usize) {
        let mut tables = self.tables.lock().unwrap();
        for _ in 0..count {
            tables.likes.push(LikeRow {
                post_id,
                user_id: Uuid::new_v4(),
                active: true,
            });
        }
    }

    fn db_failure(op: DbOperation, message: &str) -> AppError {
        AppError::Database {
            op,
            message: message.to_string(),
        }
    }
}

fn page_of<T>(items: Vec<T>, page: Pagination) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect()
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn create_post(&self, post: NewPost) -> Result<Post> {
        if self.fail_post_insert.load(Ordering::SeqCst) {
            return Err(Self::db_failure(DbOperation::Create, "post insert failed"));
        }
        let now = self.now();
        let post = Post {
            id: Uuid::new_v4(),
            user_id: post.user_id,
            caption: post.caption,
            media: post.media,
            place_id: post.place_id,
            location: None,
            view_count: 0,
            status: PostStatus::Active,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.tables.lock().unwrap().posts.push(post.clone());
        Ok(post)
    }

    async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .posts
            .iter()
            .find(|p| p.id == post_id && p.is_active())
            .cloned())
    }

    async fn get_posts_by_ids(&self, post_ids: &[Uuid]) -> Result<Vec<Post>> {
        let wanted: HashSet<&Uuid> = post_ids.iter().collect();
        Ok(self
            .tables
            .lock()
            .unwrap()
            .posts
            .iter()
            .filter(|p| wanted.contains(&p.id) && p.is_active())
            .cloned()
            .collect())
    }

    async fn update_caption(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        caption: &str,
    ) -> Result<Option<Post>> {
        let now = self.now();
        let mut tables = self.tables.lock().unwrap();
        let Some(post) = tables
            .posts
            .iter_mut()
            .find(|p| p.id == post_id && p.user_id == user_id && p.is_active())
        else {
            return Ok(None);
        };
        post.caption = caption.to_string();
        post.updated_at = now;
        Ok(Some(post.clone()))
    }

    async fn soft_delete_post(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        let now = self.now();
        let mut tables = self.tables.lock().unwrap();
        match tables
            .posts
            .iter_mut()
            .find(|p| p.id == post_id && p.user_id == user_id && p.is_active())
        {
            Some(post) => {
                post.status = PostStatus::Deleted;
                post.deleted_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn increment_view_count(&self, post_id: Uuid) -> Result<Option<i64>> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables
            .posts
            .iter_mut()
            .find(|p| p.id == post_id && p.is_active())
            .map(|post| {
                post.view_count += 1;
                post.view_count
            }))
    }

    async fn cache_location(&self, post_id: Uuid, location: &str) -> Result<()> {
        self.location_writes.fetch_add(1, Ordering::SeqCst);
        if let Some(post) = self
            .tables
            .lock()
            .unwrap()
            .posts
            .iter_mut()
            .find(|p| p.id == post_id)
        {
            post.location = Some(location.to_string());
        }
        Ok(())
    }

    async fn create_share(&self, user_id: Uuid, post_id: Uuid, caption: &str) -> Result<SharedPost> {
        let now = self.now();
        let share = SharedPost {
            id: Uuid::new_v4(),
            post_id,
            user_id,
            caption: caption.to_string(),
            status: PostStatus::Active,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.tables.lock().unwrap().shares.push(share.clone());
        Ok(share)
    }

    async fn get_shares_by_ids(&self, share_ids: &[Uuid]) -> Result<Vec<SharedPost>> {
        let wanted: HashSet<&Uuid> = share_ids.iter().collect();
        Ok(self
            .tables
            .lock()
            .unwrap()
            .shares
            .iter()
            .filter(|s| wanted.contains(&s.id) && s.is_active())
            .cloned()
            .collect())
    }

    async fn soft_delete_share(&self, share_id: Uuid, user_id: Uuid) -> Result<bool> {
        let now = self.now();
        let mut tables = self.tables.lock().unwrap();
        match tables
            .shares
            .iter_mut()
            .find(|s| s.id == share_id && s.user_id == user_id && s.is_active())
        {
            Some(share) => {
                share.status = PostStatus::Deleted;
                share.deleted_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl LikeStore for MemoryStore {
    async fn like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .likes
            .iter()
            .any(|l| l.active && l.post_id == post_id && l.user_id == user_id)
        {
            return Ok(false);
        }
        tables.likes.push(LikeRow {
            post_id,
            user_id,
            active: true,
        });
        Ok(true)
    }

    async fn unlike(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.lock().unwrap();
        match tables
            .likes
            .iter_mut()
            .find(|l| l.active && l.post_id == post_id && l.user_id == user_id)
        {
            Some(like) => {
                like.active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn like_count(&self, post_id: Uuid) -> Result<i64> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .likes
            .iter()
            .filter(|l| l.active && l.post_id == post_id)
            .count() as i64)
    }
}

#[async_trait]
impl FeedStore for MemoryStore {
    async fn insert_entry(&self, entry: NewFeedEntry) -> Result<FeedEntry> {
        if self
            .failing_recipients
            .lock()
            .unwrap()
            .contains(&entry.recipient_id)
        {
            return Err(Self::db_failure(DbOperation::Create, "feed insert failed"));
        }
        let now = self.now();
        let mut tables = self.tables.lock().unwrap();
        tables.next_seq += 1;
        let entry = FeedEntry {
            id: Uuid::new_v4(),
            recipient_id: entry.recipient_id,
            post_id: entry.post_id,
            actor_id: entry.actor_id,
            classification: entry.classification,
            created_at: now,
            seq: tables.next_seq,
        };
        tables.entries.push(EntryRow {
            entry: entry.clone(),
            deleted: false,
        });
        Ok(entry)
    }

    async fn list_entries(
        &self,
        recipient_id: Uuid,
        actor_ids: &[Uuid],
        page: Pagination,
    ) -> Result<Vec<FeedEntry>> {
        let actors: HashSet<&Uuid> = actor_ids.iter().collect();
        let tables = self.tables.lock().unwrap();
        let mut visible: Vec<FeedEntry> = tables
            .entries
            .iter()
            .filter(|row| {
                let entry = &row.entry;
                !row.deleted
                    && entry.recipient_id == recipient_id
                    && actors.contains(&entry.actor_id)
                    && match entry.classification {
                        FeedClassification::RegularPost => tables
                            .posts
                            .iter()
                            .any(|p| p.id == entry.post_id && p.is_active()),
                        FeedClassification::SharedPost => tables
                            .shares
                            .iter()
                            .find(|s| s.id == entry.post_id && s.is_active())
                            .map_or(false, |s| {
                                tables
                                    .posts
                                    .iter()
                                    .any(|p| p.id == s.post_id && p.is_active())
                            }),
                    }
            })
            .map(|row| row.entry.clone())
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.seq.cmp(&b.seq)));
        Ok(page_of(visible, page))
    }

    async fn soft_delete_entries_for(
        &self,
        post_id: Uuid,
        classification: FeedClassification,
    ) -> Result<u64> {
        let mut tables = self.tables.lock().unwrap();
        let mut touched = 0;
        for row in tables.entries.iter_mut().filter(|row| {
            !row.deleted
                && row.entry.post_id == post_id
                && row.entry.classification == classification
        }) {
            row.deleted = true;
            touched += 1;
        }
        Ok(touched)
    }

    async fn trending(&self, threshold: i64, page: Pagination) -> Result<Vec<TrendingCandidate>> {
        let tables = self.tables.lock().unwrap();
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for like in tables.likes.iter().filter(|l| l.active) {
            *counts.entry(like.post_id).or_default() += 1;
        }
        let mut ranked: Vec<(TrendingCandidate, DateTime<Utc>)> = tables
            .posts
            .iter()
            .filter(|p| p.is_active())
            .filter_map(|p| {
                let like_count = counts.get(&p.id).copied().unwrap_or(0);
                (like_count >= threshold).then_some((
                    TrendingCandidate {
                        post_id: p.id,
                        like_count,
                    },
                    p.created_at,
                ))
            })
            .collect();
        ranked.sort_by(|(a, a_at), (b, b_at)| {
            b.like_count
                .cmp(&a.like_count)
                .then(b_at.cmp(a_at))
                .then(b.post_id.cmp(&a.post_id))
        });
        Ok(page_of(
            ranked.into_iter().map(|(candidate, _)| candidate).collect(),
            page,
        ))
    }
}

#[async_trait]
impl RelationshipStore for MemoryStore {
    async fn find_active(
        &self,
        followee_id: Uuid,
        follower_id: Uuid,
    ) -> Result<Option<Relationship>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .relationships
            .iter()
            .find(|r| {
                r.followee_id == followee_id
                    && r.follower_id == follower_id
                    && r.deleted_at.is_none()
            })
            .cloned())
    }

    async fn restore(&self, followee_id: Uuid, follower_id: Uuid) -> Result<Option<Relationship>> {
        let mut tables = self.tables.lock().unwrap();
        let latest = tables
            .relationships
            .iter_mut()
            .filter(|r| {
                r.followee_id == followee_id
                    && r.follower_id == follower_id
                    && r.deleted_at.is_some()
            })
            .max_by_key(|r| r.deleted_at);
        Ok(latest.map(|r| {
            r.deleted_at = None;
            r.clone()
        }))
    }

    async fn insert(&self, followee_id: Uuid, follower_id: Uuid) -> Result<Relationship> {
        let now = self.now();
        let mut tables = self.tables.lock().unwrap();
        if tables.relationships.iter().any(|r| {
            r.followee_id == followee_id && r.follower_id == follower_id && r.deleted_at.is_none()
        }) {
            return Err(AppError::AlreadyExists("relationship".to_string()));
        }
        let relationship = Relationship {
            id: Uuid::new_v4(),
            followee_id,
            follower_id,
            created_at: now,
            deleted_at: None,
        };
        tables.relationships.push(relationship.clone());
        Ok(relationship)
    }

    async fn soft_delete(&self, followee_id: Uuid, follower_id: Uuid) -> Result<bool> {
        let now = self.now();
        let mut tables = self.tables.lock().unwrap();
        match tables.relationships.iter_mut().find(|r| {
            r.followee_id == followee_id && r.follower_id == follower_id && r.deleted_at.is_none()
        }) {
            Some(r) => {
                r.deleted_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_followers(&self, user_id: Uuid, page: Pagination) -> Result<Vec<Relationship>> {
        let mut rows: Vec<Relationship> = self
            .tables
            .lock()
            .unwrap()
            .relationships
            .iter()
            .filter(|r| r.followee_id == user_id && r.deleted_at.is_none())
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page_of(rows, page))
    }

    async fn list_followings(&self, user_id: Uuid, page: Pagination) -> Result<Vec<Relationship>> {
        let mut rows: Vec<Relationship> = self
            .tables
            .lock()
            .unwrap()
            .relationships
            .iter()
            .filter(|r| r.follower_id == user_id && r.deleted_at.is_none())
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page_of(rows, page))
    }

    async fn follower_ids_after(
        &self,
        user_id: Uuid,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Uuid>> {
        if self.fail_follower_reads.load(Ordering::SeqCst) {
            return Err(Self::db_failure(DbOperation::Get, "follower read failed"));
        }
        let mut ids: Vec<Uuid> = self
            .tables
            .lock()
            .unwrap()
            .relationships
            .iter()
            .filter(|r| r.followee_id == user_id && r.deleted_at.is_none())
            .map(|r| r.follower_id)
            .filter(|id| after.map_or(true, |after| *id > after))
            .collect();
        ids.sort();
        ids.truncate(limit as usize);
        Ok(ids)
    }

    async fn followee_ids_after(
        &self,
        user_id: Uuid,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Uuid>> {
        let mut ids: Vec<Uuid> = self
            .tables
            .lock()
            .unwrap()
            .relationships
            .iter()
            .filter(|r| r.follower_id == user_id && r.deleted_at.is_none())
            .map(|r| r.followee_id)
            .filter(|id| after.map_or(true, |after| *id > after))
            .collect();
        ids.sort();
        ids.truncate(limit as usize);
        Ok(ids)
    }
}

/// Identity provider that knows every user except the ones marked failing
#[derive(Clone, Default)]
pub struct FakeIdentity {
    failing: Arc<Mutex<HashSet<Uuid>>>,
    calls: Arc<AtomicUsize>,
}

impl FakeIdentity {
    pub fn fail_for(&self, user_id: Uuid) {
        self.failing.lock().unwrap().insert(user_id);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityLookup for FakeIdentity {
    async fn get_profile(&self, user_id: Uuid) -> std::result::Result<ActorProfile, IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&user_id) {
            return Err(IdentityError::Unavailable("injected".to_string()));
        }
        Ok(ActorProfile {
            id: user_id,
            name: format!("user-{}", &user_id.to_string()[..8]),
            avatar_url: Some(format!("https://cdn.test/avatars/{}.png", user_id)),
        })
    }
}

/// Geocoder with a fixed table of places
#[derive(Clone, Default)]
pub struct FakePlaces {
    places: Arc<Mutex<HashMap<String, Place>>>,
    calls: Arc<AtomicUsize>,
}

impl FakePlaces {
    pub fn add(&self, place_id: &str, name: &str, vicinity: &str) {
        self.places.lock().unwrap().insert(
            place_id.to_string(),
            Place {
                name: name.to_string(),
                vicinity: Some(vicinity.to_string()),
            },
        );
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaceResolver for FakePlaces {
    async fn resolve(&self, place_id: &str) -> std::result::Result<Place, GeoLookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.places
            .lock()
            .unwrap()
            .get(place_id)
            .cloned()
            .ok_or_else(|| GeoLookupError::NotFound(place_id.to_string()))
    }
}

/// Presigner that fails for keys containing `fail`
#[derive(Clone, Default)]
pub struct FakeMedia;

#[async_trait]
impl MediaLocator for FakeMedia {
    async fn presign_upload(
        &self,
        key: &str,
        _content_type: &str,
        _acl: &str,
    ) -> std::result::Result<String, StorageError> {
        if key.contains("fail") {
            return Err(StorageError::Presign {
                key: key.to_string(),
                message: "injected".to_string(),
            });
        }
        Ok(format!("https://upload.test/{}?signature=abc", key))
    }

    fn default_acl(&self) -> &str {
        "public-read"
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://cdn.test/{}", key)
    }
}

/// A wired set of services over one `MemoryStore`
pub struct Harness {
    pub store: MemoryStore,
    pub identity: FakeIdentity,
    pub places: FakePlaces,
    pub feed: Arc<FeedPipeline>,
    pub posts: Arc<PostService>,
    pub follows: Arc<FollowService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(FeedConfig::default())
    }

    pub fn with_policy(policy: EnrichmentPolicy) -> Self {
        Self::with_settings(FeedConfig {
            enrichment_policy: policy,
            ..FeedConfig::default()
        })
    }

    pub fn with_settings(settings: FeedConfig) -> Self {
        let store = MemoryStore::new();
        let identity = FakeIdentity::default();
        let places = FakePlaces::default();
        let deps = Collaborators {
            posts: Arc::new(store.clone()),
            likes: Arc::new(store.clone()),
            feeds: Arc::new(store.clone()),
            relationships: Arc::new(store.clone()),
            identity: Arc::new(identity.clone()),
            media: Arc::new(FakeMedia),
            places: Arc::new(places.clone()),
        };
        let max_page_size = settings.max_page_size;
        Self {
            feed: Arc::new(FeedPipeline::new(&deps, settings, "posts")),
            posts: Arc::new(PostService::new(&deps)),
            follows: Arc::new(FollowService::new(
                deps.relationships.clone(),
                max_page_size,
            )),
            store,
            identity,
            places,
        }
    }
}
