use actix_web::{web, HttpRequest, HttpResponse};

use super::{extract_user_id, parse_id, AppState, PageQuery};
use crate::error::Result;

/// Caller follows the user in the path
pub async fn follow(
    req: HttpRequest,
    state: web::Data<AppState>,
    user_id: web::Path<String>,
) -> Result<HttpResponse> {
    let follower_id = extract_user_id(&req)?;
    let followee_id = parse_id(&user_id, "user")?;
    let relationship = state.follows.follow(followee_id, follower_id).await?;
    Ok(HttpResponse::Created().json(relationship))
}

pub async fn unfollow(
    req: HttpRequest,
    state: web::Data<AppState>,
    user_id: web::Path<String>,
) -> Result<HttpResponse> {
    let follower_id = extract_user_id(&req)?;
    let followee_id = parse_id(&user_id, "user")?;
    state.follows.unfollow(followee_id, follower_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn get_followers(
    state: web::Data<AppState>,
    user_id: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let user_id = parse_id(&user_id, "user")?;
    let page = query.pagination(state.feed.settings().default_page_size);
    let followers = state.follows.get_followers(user_id, page).await?;
    Ok(HttpResponse::Ok().json(followers))
}

pub async fn get_followings(
    state: web::Data<AppState>,
    user_id: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let user_id = parse_id(&user_id, "user")?;
    let page = query.pagination(state.feed.settings().default_page_size);
    let followings = state.follows.get_followings(user_id, page).await?;
    Ok(HttpResponse::Ok().json(followings))
}
