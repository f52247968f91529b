//! HTTP surface tests: routing, the x-user-id header and error mapping

mod common;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};
use uuid::Uuid;

use common::Harness;
use feed_service::handlers::{self, AppState};

fn state(h: &Harness) -> web::Data<AppState> {
    web::Data::new(AppState {
        feed: h.feed.clone(),
        posts: h.posts.clone(),
        follows: h.follows.clone(),
    })
}

#[actix_web::test]
async fn create_post_requires_user_header() {
    let h = Harness::new();
    let app = test::init_service(
        App::new()
            .app_data(state(&h))
            .configure(handlers::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/posts")
        .set_json(json!({ "caption": "hi" }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[actix_web::test]
async fn post_then_read_home_feed() {
    let h = Harness::new();
    let app = test::init_service(
        App::new()
            .app_data(state(&h))
            .configure(handlers::configure),
    )
    .await;
    let author = Uuid::new_v4();

    let req = test::TestRequest::post()
        .uri("/api/v1/posts")
        .insert_header(("x-user-id", author.to_string()))
        .set_json(json!({
            "caption": "first post",
            "media": [{ "fileName": "cat.gif", "mediaType": "image/gif" }]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["fanout"]["delivered"], 1);
    assert!(created["uploads"][0]["uploadUrl"].is_string());

    let req = test::TestRequest::get()
        .uri("/api/v1/feed?page=1&size=5")
        .insert_header(("x-user-id", author.to_string()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page: Value = test::read_body_json(resp).await;
    assert_eq!(page["size"], 5);
    assert_eq!(page["items"][0]["caption"], "first post");
    assert_eq!(page["items"][0]["classification"], "REGULAR_POST");
}

#[actix_web::test]
async fn follow_errors_map_to_status_codes() {
    let h = Harness::new();
    let app = test::init_service(
        App::new()
            .app_data(state(&h))
            .configure(handlers::configure),
    )
    .await;
    let (me, other) = (Uuid::new_v4(), Uuid::new_v4());

    let follow = |target: Uuid| {
        test::TestRequest::post()
            .uri(&format!("/api/v1/users/{}/follow", target))
            .insert_header(("x-user-id", me.to_string()))
            .to_request()
    };

    let resp = test::call_service(&app, follow(other)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = test::call_service(&app, follow(other)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = test::call_service(&app, follow(me)).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/users/{}/follow", other))
        .insert_header(("x-user-id", me.to_string()))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NO_CONTENT
    );

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/users/{}/follow", other))
        .insert_header(("x-user-id", me.to_string()))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[actix_web::test]
async fn malformed_ids_are_bad_requests() {
    let h = Harness::new();
    let app = test::init_service(
        App::new()
            .app_data(state(&h))
            .configure(handlers::configure),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/api/v1/posts/not-a-uuid")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/api/v1/feed/trending?threshold=-3")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn health_is_open() {
    let h = Harness::new();
    let app = test::init_service(
        App::new()
            .app_data(state(&h))
            .configure(handlers::configure),
    )
    .await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
