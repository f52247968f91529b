use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use super::{extract_user_id, AppState, PageQuery};
use crate::error::Result;
use crate::models::Pagination;

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub threshold: Option<i64>,
}

/// Home feed of the caller
pub async fn get_feed(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let user_id = extract_user_id(&req)?;
    let page = query.pagination(state.feed.settings().default_page_size);
    let feed = state.feed.get_feed(user_id, page).await?;
    Ok(HttpResponse::Ok().json(feed))
}

/// Most-liked posts; `threshold` overrides the configured minimum like count
pub async fn get_trending_feed(
    state: web::Data<AppState>,
    query: web::Query<TrendingQuery>,
) -> Result<HttpResponse> {
    let page = Pagination::new(
        query.page.unwrap_or(1),
        query
            .size
            .unwrap_or(state.feed.settings().default_page_size),
    );
    let feed = state.feed.get_trending_feed(page, query.threshold).await?;
    Ok(HttpResponse::Ok().json(feed))
}
