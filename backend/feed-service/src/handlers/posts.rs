/// Post handlers - create, read, edit, delete, share, like and view posts
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use super::{extract_user_id, parse_id, AppState};
use crate::error::Result;
use crate::models::MediaUpload;
use crate::services::CreatePostRequest;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostBody {
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub media: Vec<MediaUpload>,
    #[serde(default)]
    pub place_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCaptionBody {
    pub caption: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SharePostBody {
    #[serde(default)]
    pub caption: Option<String>,
}

/// Create a post; the response carries one presigned upload per media file
pub async fn create_post(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<CreatePostBody>,
) -> Result<HttpResponse> {
    let author_id = extract_user_id(&req)?;
    let body = payload.into_inner();
    let outcome = state
        .feed
        .create_post(
            author_id,
            CreatePostRequest {
                caption: body.caption,
                media: body.media,
                place_id: body.place_id,
            },
        )
        .await?;
    Ok(HttpResponse::Created().json(outcome))
}

pub async fn get_post(state: web::Data<AppState>, post_id: web::Path<String>) -> Result<HttpResponse> {
    let post_id = parse_id(&post_id, "post")?;
    let post = state.posts.get_post_by_id(post_id).await?;
    Ok(HttpResponse::Ok().json(post))
}

pub async fn update_caption(
    req: HttpRequest,
    state: web::Data<AppState>,
    post_id: web::Path<String>,
    payload: web::Json<UpdateCaptionBody>,
) -> Result<HttpResponse> {
    let user_id = extract_user_id(&req)?;
    let post_id = parse_id(&post_id, "post")?;
    let post = state
        .posts
        .update_caption(post_id, user_id, &payload.caption)
        .await?;
    Ok(HttpResponse::Ok().json(post))
}

/// Soft-delete a post owned by the caller
pub async fn delete_post(
    req: HttpRequest,
    state: web::Data<AppState>,
    post_id: web::Path<String>,
) -> Result<HttpResponse> {
    let user_id = extract_user_id(&req)?;
    let post_id = parse_id(&post_id, "post")?;
    state.posts.delete_post(post_id, user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn record_view(
    state: web::Data<AppState>,
    post_id: web::Path<String>,
) -> Result<HttpResponse> {
    let post_id = parse_id(&post_id, "post")?;
    let view_count = state.posts.increment_view_count(post_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "postId": post_id, "viewCount": view_count })))
}

pub async fn share_post(
    req: HttpRequest,
    state: web::Data<AppState>,
    post_id: web::Path<String>,
    payload: Option<web::Json<SharePostBody>>,
) -> Result<HttpResponse> {
    let user_id = extract_user_id(&req)?;
    let post_id = parse_id(&post_id, "post")?;
    let caption = payload.and_then(|body| body.into_inner().caption);
    let outcome = state.feed.share_post(user_id, post_id, caption).await?;
    Ok(HttpResponse::Created().json(outcome))
}

pub async fn delete_share(
    req: HttpRequest,
    state: web::Data<AppState>,
    share_id: web::Path<String>,
) -> Result<HttpResponse> {
    let user_id = extract_user_id(&req)?;
    let share_id = parse_id(&share_id, "share")?;
    state.posts.delete_share(share_id, user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn like_post(
    req: HttpRequest,
    state: web::Data<AppState>,
    post_id: web::Path<String>,
) -> Result<HttpResponse> {
    let user_id = extract_user_id(&req)?;
    let post_id = parse_id(&post_id, "post")?;
    let like_count = state.posts.like(post_id, user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "postId": post_id, "likeCount": like_count })))
}

pub async fn unlike_post(
    req: HttpRequest,
    state: web::Data<AppState>,
    post_id: web::Path<String>,
) -> Result<HttpResponse> {
    let user_id = extract_user_id(&req)?;
    let post_id = parse_id(&post_id, "post")?;
    let like_count = state.posts.unlike(post_id, user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "postId": post_id, "likeCount": like_count })))
}
