//! HTTP surface of the feed service, mounted under `/api/v1`.
//!
//! The gateway authenticates callers and forwards the user id in the
//! `x-user-id` header.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::Pagination;
use crate::services::{FeedPipeline, FollowService, PostService};

pub mod feed;
pub mod follows;
pub mod posts;

const USER_ID_HEADER: &str = "x-user-id";

/// Shared handler state
pub struct AppState {
    pub feed: Arc<FeedPipeline>,
    pub posts: Arc<PostService>,
    pub follows: Arc<FollowService>,
}

/// `page` / `size` query parameters; missing values use the feed defaults
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl PageQuery {
    pub fn pagination(&self, default_size: u32) -> Pagination {
        Pagination::new(self.page.unwrap_or(1), self.size.unwrap_or(default_size))
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/posts", web::post().to(posts::create_post))
            .route("/posts/{id}", web::get().to(posts::get_post))
            .route("/posts/{id}", web::patch().to(posts::update_caption))
            .route("/posts/{id}", web::delete().to(posts::delete_post))
            .route("/posts/{id}/views", web::post().to(posts::record_view))
            .route("/posts/{id}/shares", web::post().to(posts::share_post))
            .route("/posts/{id}/likes", web::post().to(posts::like_post))
            .route("/posts/{id}/likes", web::delete().to(posts::unlike_post))
            .route("/shares/{id}", web::delete().to(posts::delete_share))
            .route("/feed", web::get().to(feed::get_feed))
            .route("/feed/trending", web::get().to(feed::get_trending_feed))
            .route("/users/{id}/follow", web::post().to(follows::follow))
            .route("/users/{id}/follow", web::delete().to(follows::unfollow))
            .route("/users/{id}/followers", web::get().to(follows::get_followers))
            .route("/users/{id}/followings", web::get().to(follows::get_followings)),
    )
    .route("/health", web::get().to(health))
    .route("/metrics", web::get().to(crate::metrics::serve_metrics));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

fn extract_user_id(req: &HttpRequest) -> Result<Uuid> {
    let header_value = req
        .headers()
        .get(USER_ID_HEADER)
        .ok_or_else(|| AppError::Unauthorized("Missing x-user-id header".into()))?;

    let value = header_value
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid x-user-id header".into()))?;

    Uuid::parse_str(value.trim())
        .map_err(|_| AppError::Unauthorized("Invalid x-user-id header value".into()))
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid {} ID", what)))
}
