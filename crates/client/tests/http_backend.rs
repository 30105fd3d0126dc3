//! HTTP backend integration tests.
//!
//! A local axum server stands in for the REST API so the full request path
//! (URL building, auth header, status mapping, envelope parsing) is exercised.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
    routing::{delete, get, post},
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use volunteer_client::HttpBackend;
use volunteer_common::config::ApiConfig;
use volunteer_common::{ClientError, Session};
use volunteer_core::{
    Backend, Comment, CommentTree, MutationController, NormalizeContext, PaginatedCollection,
    Placement, Post, Reaction, Resource, ToggleAction,
};

const TOKEN: &str = "volunteer-token";

/// Requests the fake API has seen, as `METHOD path?query`.
type Seen = Arc<Mutex<Vec<String>>>;

#[derive(Clone, Default)]
struct FakeApi {
    seen: Seen,
}

impl FakeApi {
    fn record(&self, line: String) {
        self.seen.lock().push(line);
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

fn unauthorized() -> axum::response::Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "Sign in required" })),
    )
        .into_response()
}

async fn list_posts(
    State(api): State<FakeApi>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let page = query.get("page").cloned().unwrap_or_default();
    let limit = query.get("limit").cloned().unwrap_or_default();
    api.record(format!("GET /api/posts?page={page}&limit={limit}"));

    let body = match page.as_str() {
        "1" => json!({
            "data": [
                { "_id": 1, "text": "first", "user": { "id": 9, "name": "Ana", "avatar": "avatars/ana.png" } },
                { "_id": 2, "body": "second", "likes": 4, "isLiked": true }
            ],
            "meta": { "page": 1, "lastPage": 2 }
        }),
        _ => json!({
            "data": [
                { "_id": 2, "body": "second (again)" },
                { "_id": 3, "content": "third" }
            ],
            "meta": { "page": 2, "lastPage": 2 }
        }),
    };
    Json(body)
}

async fn list_comments(State(api): State<FakeApi>, Path(post_id): Path<String>) -> Json<Value> {
    api.record(format!("GET /api/posts/{post_id}/comments"));
    Json(json!([
        { "id": "c1", "content": "root" },
        { "id": "c2", "parentId": "c1", "content": "reply" },
        { "id": "c3", "parent": { "id": "c2" }, "content": "nested" }
    ]))
}

async fn like_post(
    State(api): State<FakeApi>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> axum::response::Response {
    api.record(format!("POST /api/posts/{id}/like"));
    if !authorized(&headers) {
        return unauthorized();
    }
    if id == "3" {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "Post is locked" })),
        )
            .into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn update_post(
    State(api): State<FakeApi>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(patch): Json<Value>,
) -> axum::response::Response {
    api.record(format!("PATCH /api/posts/{id}"));
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({ "id": id, "content": patch["content"], "updatedBy": "server" })).into_response()
}

async fn delete_post(
    State(api): State<FakeApi>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> axum::response::Response {
    api.record(format!("DELETE /api/posts/{id}"));
    if !authorized(&headers) {
        return unauthorized();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn create_post(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> axum::response::Response {
    let created = api.seen.lock().iter().filter(|line| *line == "POST /api/posts").count();
    api.record("POST /api/posts".to_string());
    if !authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Post created",
            "data": { "id": 10 + created, "content": body["content"] }
        })),
    )
        .into_response()
}

async fn broken_events(State(api): State<FakeApi>) -> &'static str {
    api.record("GET /api/events".to_string());
    "<html>maintenance</html>"
}

/// Start the fake API and return a backend pointed at it.
async fn spawn_api() -> (HttpBackend, FakeApi) {
    let api = FakeApi::default();
    let app = Router::new()
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/{id}", delete(delete_post).patch(update_post))
        .route("/api/posts/{id}/like", post(like_post))
        .route("/api/posts/{id}/comments", get(list_comments))
        .route("/api/events", get(broken_events))
        .with_state(api.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let backend = HttpBackend::new(&ApiConfig::new(format!("http://{addr}/api"))).unwrap();
    (backend, api)
}

fn posts(backend: HttpBackend, session: Session) -> Arc<PaginatedCollection<Post>> {
    let ctx = NormalizeContext::new(Some("https://cdn.example.org/media")).unwrap();
    Arc::new(
        PaginatedCollection::new(Arc::new(backend), session, Resource::Posts, ctx)
            .with_page_size(2),
    )
}

#[tokio::test]
async fn test_list_sends_page_and_limit() {
    let (backend, api) = spawn_api().await;

    let page = backend
        .list(&Session::anonymous(), &Resource::Posts, 1, 2)
        .await
        .unwrap();

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.current_page, Some(1));
    assert_eq!(page.total_pages, Some(2));
    assert!(page.has_more(1));
    assert_eq!(api.seen.lock().as_slice(), ["GET /api/posts?page=1&limit=2"]);
}

#[tokio::test]
async fn test_feed_pages_are_normalized_and_deduplicated() {
    let (backend, _api) = spawn_api().await;
    let feed = posts(backend, Session::anonymous());

    feed.refresh().await.unwrap();
    assert!(feed.has_more());
    let first = feed.get("1").unwrap();
    assert_eq!(first.entity.content, "first");
    assert_eq!(first.entity.author.display_name, "Ana");
    assert_eq!(
        first.entity.author.avatar_url.as_deref(),
        Some("https://cdn.example.org/media/avatars/ana.png")
    );

    assert!(feed.load_more().await.unwrap());
    let ids: Vec<String> = feed.items().iter().map(|p| p.entity.id.clone()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert_eq!(feed.get("2").unwrap().entity.content, "second");
    assert!(!feed.has_more());
}

#[tokio::test]
async fn test_toggle_with_session_and_rollback() {
    let (backend, api) = spawn_api().await;
    let feed = posts(backend, Session::bearer(TOKEN));
    feed.refresh().await.unwrap();
    feed.load_more().await.unwrap();
    let controller = MutationController::new(Arc::clone(&feed));

    let snapshot = controller.toggle("2", Reaction).await.unwrap();
    assert!(!snapshot.after.active);
    assert_eq!(snapshot.after.count, 3);
    let post = feed.get("2").unwrap();
    assert!(!post.entity.viewer_state.liked);
    assert_eq!(post.entity.counters.like_count, 3);

    let err = controller.toggle("3", Reaction).await.unwrap_err();
    assert_eq!(err, ClientError::rejected(409, "Post is locked"));
    assert_eq!(err.user_message(), "Post is locked");
    let post = feed.get("3").unwrap();
    assert!(!post.entity.viewer_state.liked);
    assert_eq!(post.entity.counters.like_count, 0);
    assert_eq!(controller.state().error, Some(err));

    let seen = api.seen.lock().clone();
    assert!(seen.contains(&"POST /api/posts/2/like".to_string()));
    assert!(seen.contains(&"POST /api/posts/3/like".to_string()));
}

#[tokio::test]
async fn test_missing_credential_is_unauthorized() {
    let (backend, api) = spawn_api().await;

    let err = backend
        .toggle(&Session::anonymous(), &Resource::Posts, "1", ToggleAction::React)
        .await
        .unwrap_err();
    assert_eq!(err, ClientError::Unauthorized);

    let err = backend
        .toggle(&Session::bearer("stale"), &Resource::Posts, "1", ToggleAction::React)
        .await
        .unwrap_err();
    assert_eq!(err, ClientError::Unauthorized);
    assert_eq!(api.seen.lock().len(), 2);
}

#[tokio::test]
async fn test_create_edit_and_delete() {
    let (backend, api) = spawn_api().await;
    let feed = posts(backend, Session::bearer(TOKEN));
    feed.refresh().await.unwrap();
    let controller = MutationController::new(Arc::clone(&feed));

    let created = controller
        .create(json!({ "content": "hello" }), Placement::Front)
        .await
        .unwrap();
    assert_eq!(created.entity.id, "10");
    assert_eq!(created.entity.content, "hello");
    assert_eq!(feed.items()[0].entity.id, "10");

    let edited = controller.edit_content("1", "first, edited").await.unwrap();
    assert_eq!(edited.entity.content, "first, edited");
    assert_eq!(edited.entity.author.display_name, "Ana");

    let removed = controller.delete("1").await.unwrap();
    assert_eq!(removed.unwrap().entity.id, "1");
    assert!(feed.get("1").is_none());

    let seen = api.seen.lock().clone();
    assert!(seen.contains(&"PATCH /api/posts/1".to_string()));
    assert!(seen.contains(&"DELETE /api/posts/1".to_string()));
}

#[tokio::test]
async fn test_enveloped_create_responses() {
    let (backend, _api) = spawn_api().await;
    let feed = posts(backend, Session::bearer(TOKEN));
    let controller = MutationController::new(Arc::clone(&feed));

    let first = controller
        .create(json!({ "content": "hello" }), Placement::Front)
        .await
        .unwrap();
    let second = controller
        .create(json!({ "content": "again" }), Placement::Front)
        .await
        .unwrap();

    assert_eq!(first.entity.id, "10");
    assert_eq!(first.entity.content, "hello");
    assert_eq!(second.entity.id, "11");
    assert_eq!(second.entity.content, "again");
    let ids: Vec<String> = feed.items().iter().map(|p| p.entity.id.clone()).collect();
    assert_eq!(ids, vec!["11", "10"]);
}

#[tokio::test]
async fn test_comment_thread_from_bare_array() {
    let (backend, _api) = spawn_api().await;
    let comments: PaginatedCollection<Comment> = PaginatedCollection::new(
        Arc::new(backend),
        Session::anonymous(),
        Resource::comments("1"),
        NormalizeContext::default(),
    );

    comments.refresh().await.unwrap();
    assert!(!comments.has_more());

    let tree = CommentTree::from_collection(&comments);
    let walked: Vec<(usize, String)> = tree
        .depth_first()
        .into_iter()
        .map(|(depth, c)| (depth, c.entity.id.clone()))
        .collect();
    assert_eq!(
        walked,
        vec![(0, "c1".to_string()), (1, "c2".to_string()), (2, "c3".to_string())]
    );
}

#[tokio::test]
async fn test_non_json_body_is_invalid_response() {
    let (backend, _api) = spawn_api().await;

    let err = backend
        .list(&Session::anonymous(), &Resource::Events, 1, 20)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_RESPONSE");
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = HttpBackend::new(&ApiConfig::new(format!("http://{addr}/"))).unwrap();
    let err = backend
        .list(&Session::anonymous(), &Resource::Posts, 1, 20)
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert_eq!(err.code(), "TRANSPORT_ERROR");
}
