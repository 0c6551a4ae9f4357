use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

use blog_cms::{
    blog_interface::{create_blog_router, BlogInterface},
    database::BlogDatabase,
    entities::EntUser,
    infrastructure::{
        audit::{AuditLog, AuditSink, DatabaseAuditSink, TracingAuditSink},
        auth::{AuthProvider, Claims, JwtAuthProvider},
    },
};

const SECRET: &str = "integration-secret";

struct TestApp {
    router: Router,
    alice: EntUser,
    bob: EntUser,
    admin: EntUser,
}

impl TestApp {
    async fn new() -> Self {
        let db = Arc::new(BlogDatabase::new_in_memory().await.unwrap());
        let sink = Arc::new(DatabaseAuditSink::new(db.pool.clone()));
        Self::with_sink(db, sink).await
    }

    async fn with_sink(db: Arc<BlogDatabase>, sink: Arc<dyn AuditSink>) -> Self {
        let alice = db.create_user("alice", "alice@example.com", false).await.unwrap();
        let bob = db.create_user("bob", "bob@example.com", false).await.unwrap();
        let admin = db.create_user("admin", "admin@example.com", true).await.unwrap();

        let blog = BlogInterface::new(db, AuditLog::new(sink));
        let auth: Arc<dyn AuthProvider> = Arc::new(JwtAuthProvider::new(SECRET));
        let router = create_blog_router(blog, auth);

        Self { router, alice, bob, admin }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

fn token_with_exp(user: &EntUser, exp_offset: i64) -> String {
    let claims = Claims {
        sub: user.id.to_string(),
        is_staff: user.is_staff,
        exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

fn token(user: &EntUser) -> String {
    token_with_exp(user, 3600)
}

async fn create_article(app: &TestApp, user: &EntUser, title: &str) -> Value {
    let (status, body) = app
        .send(
            Method::POST,
            "/articles",
            Some(&token(user)),
            Some(json!({"title": title, "content": "Body text"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_credentials_are_classified() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(Method::POST, "/articles", None, Some(json!({"title": "t", "content": "c"})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "not_authenticated");

    let expired = token_with_exp(&app.alice, -7200);
    let (status, body) = app.send(Method::GET, "/articles", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "token_expired");

    let (status, body) = app.send(Method::GET, "/articles", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "token_invalid");

    let request = Request::builder()
        .uri("/articles")
        .header(header::AUTHORIZATION, "Basic YWxpY2U6c2VjcmV0")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // reads stay public
    let (status, _) = app.send(Method::GET, "/articles", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_article_author_rules() {
    let app = TestApp::new().await;

    // a member cannot post on behalf of someone else
    let (status, body) = app
        .send(
            Method::POST,
            "/articles",
            Some(&token(&app.alice)),
            Some(json!({"title": "Mine", "content": "c", "author": app.bob.id})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["author_id"], app.alice.id);

    let (status, body) = app
        .send(
            Method::POST,
            "/articles",
            Some(&token(&app.admin)),
            Some(json!({"title": "Ghostwritten", "content": "c", "author_id": app.bob.id})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["author_name"], "bob");

    let (status, body) = app
        .send(
            Method::POST,
            "/articles",
            Some(&token(&app.admin)),
            Some(json!({"title": "Nobody", "content": "c", "author_id": 4242})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Author not found.");

    let id = body_id(&create_article(&app, &app.alice, "Editable").await);
    let (status, _) = app
        .send(
            Method::PATCH,
            &format!("/articles/{}", id),
            Some(&token(&app.bob)),
            Some(json!({"title": "Stolen"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/articles/{}", id),
            Some(&token(&app.alice)),
            Some(json!({"title": "Edited"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Edited");

    let (status, _) = app.send(Method::GET, "/articles/9999", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn body_id(body: &Value) -> i64 {
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_comment_thread_over_http() {
    let app = TestApp::new().await;
    let article_id = body_id(&create_article(&app, &app.alice, "Threads").await);

    let (status, root) = app
        .send(
            Method::POST,
            &format!("/articles/{}/comments", article_id),
            Some(&token(&app.alice)),
            Some(json!({"content": "root"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(root["is_author"], true);
    let root_id = body_id(&root);

    let (status, reply) = app
        .send(
            Method::POST,
            &format!("/comments/{}/add_reply", root_id),
            Some(&token(&app.bob)),
            Some(json!({"content": "reply"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reply["parent_id"], root_id);
    assert_eq!(reply["article_id"], article_id);

    let (status, reply2) = app
        .send(
            Method::POST,
            "/comments",
            Some(&token(&app.bob)),
            Some(json!({"content": "nested", "parent": body_id(&reply)})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reply2["article_id"], article_id);

    let (status, listing) = app
        .send(Method::GET, &format!("/articles/{}/comments", article_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let roots = listing.as_array().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["reply_count"], 1);
    assert_eq!(roots[0]["replies"][0]["replies"][0]["content"], "nested");
    assert_eq!(roots[0]["can_delete"], false);

    let (status, replies) = app
        .send(Method::GET, &format!("/comments/{}/replies", root_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replies[0]["id"], reply["id"]);

    // 403 for an existing comment, 404 for a missing one
    let (status, _) = app
        .send(Method::DELETE, &format!("/comments/{}", root_id), Some(&token(&app.bob)), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .send(Method::DELETE, "/comments/9999", Some(&token(&app.bob)), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(Method::DELETE, &format!("/comments/{}", root_id), Some(&token(&app.admin)), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = app
        .send(Method::GET, &format!("/comments/{}", body_id(&reply2)), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cross_article_parent_is_bad_request() {
    let app = TestApp::new().await;
    let first = body_id(&create_article(&app, &app.alice, "First").await);
    let second = body_id(&create_article(&app, &app.alice, "Second").await);

    let (_, root) = app
        .send(
            Method::POST,
            &format!("/articles/{}/comments", first),
            Some(&token(&app.bob)),
            Some(json!({"content": "root"})),
        )
        .await;

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/articles/{}/comments", second),
            Some(&token(&app.bob)),
            Some(json!({"content": "wrong thread", "parent_id": body_id(&root)})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("parent/article mismatch"));
}

#[tokio::test]
async fn test_taxonomy_and_search() {
    let app = TestApp::new().await;

    let (status, tag) = app
        .send(Method::POST, "/tags", Some(&token(&app.alice)), Some(json!({"name": "Rust Lang"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(tag["slug"], "rust-lang");
    let tag_id = body_id(&tag);

    let (status, _) = app
        .send(Method::POST, "/tags", Some(&token(&app.bob)), Some(json!({"name": "Rust Lang"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::PATCH,
            &format!("/tags/{}", tag_id),
            Some(&token(&app.alice)),
            Some(json!({"name": "Rust"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, renamed) = app
        .send(
            Method::PATCH,
            &format!("/tags/{}", tag_id),
            Some(&token(&app.admin)),
            Some(json!({"name": "Rust"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["name"], "Rust");
    assert_eq!(renamed["slug"], "rust-lang");

    let (status, category) = app
        .send(
            Method::POST,
            "/categories",
            Some(&token(&app.alice)),
            Some(json!({"name": "Systems", "description": "Low level"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .send(
            Method::POST,
            "/articles",
            Some(&token(&app.alice)),
            Some(json!({"title": "Ownership", "content": "Borrowing explained", "tags": [tag_id], "categories": [body_id(&category)]})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    create_article(&app, &app.bob, "Gardening").await;

    let (status, _) = app
        .send(
            Method::POST,
            "/articles",
            Some(&token(&app.alice)),
            Some(json!({"title": "Bad", "content": "c", "tags": [777]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, hits) = app.send(Method::GET, "/articles/search?q=RUST", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["title"], "Ownership");

    let (_, all) = app.send(Method::GET, "/articles/search?q=", None, None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (status, _) = app
        .send(Method::DELETE, &format!("/tags/{}", tag_id), Some(&token(&app.admin)), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send(Method::GET, &format!("/tags/{}", tag_id), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_surface() {
    let app = TestApp::new().await;
    let article_id = body_id(&create_article(&app, &app.alice, "Counted").await);
    app.send(
        Method::POST,
        &format!("/articles/{}/comments", article_id),
        Some(&token(&app.bob)),
        Some(json!({"content": "hello"})),
    )
    .await;

    let (status, _) = app.send(Method::GET, "/admin/stats", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.send(Method::GET, "/admin/stats", Some(&token(&app.alice)), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, stats) = app.send(Method::GET, "/admin/stats", Some(&token(&app.admin)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats, json!({"total_users": 3, "total_articles": 1, "total_comments": 1}));

    let (status, activity) = app
        .send(Method::GET, "/admin/activity?limit=10", Some(&token(&app.admin)), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let actions: Vec<&str> = activity
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action_type"].as_str().unwrap())
        .collect();
    assert!(actions.contains(&"ARTICLE_CREATED"));
    assert!(actions.contains(&"COMMENT_CREATED"));

    let (status, user) = app
        .send(
            Method::POST,
            "/admin/users",
            Some(&token(&app.admin)),
            Some(json!({"username": "carol", "email": "carol@example.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let carol = body_id(&user);

    let (status, user) = app
        .send(
            Method::PATCH,
            &format!("/admin/users/{}", carol),
            Some(&token(&app.admin)),
            Some(json!({"is_staff": true})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["is_staff"], true);

    let (status, _) = app
        .send(Method::DELETE, &format!("/admin/users/{}", app.alice.id), Some(&token(&app.admin)), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // alice's article and the comment under it are gone with her
    let (_, stats) = app.send(Method::GET, "/admin/stats", Some(&token(&app.admin)), None).await;
    assert_eq!(stats, json!({"total_users": 3, "total_articles": 0, "total_comments": 0}));
}

#[tokio::test]
async fn test_me_endpoint() {
    let db = Arc::new(BlogDatabase::new_in_memory().await.unwrap());
    let app = TestApp::with_sink(db, Arc::new(TracingAuditSink)).await;

    let (status, body) = app.send(Method::GET, "/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "not_authenticated");

    let (status, me) = app.send(Method::GET, "/users/me", Some(&token(&app.bob)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "bob");

    let ghost = EntUser { id: 999, ..app.bob.clone() };
    let (status, _) = app.send(Method::GET, "/users/me", Some(&token(&ghost)), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, me) = app
        .send(
            Method::PATCH,
            "/users/me",
            Some(&token(&app.bob)),
            Some(json!({"email": " bob@new.example.com ", "is_staff": true})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "bob@new.example.com");
    assert_eq!(me["is_staff"], false);

    let (status, _) = app
        .send(Method::PATCH, "/users/me", None, Some(json!({"email": "anon@example.com"})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_comment_listing_and_stale_author() {
    let app = TestApp::new().await;
    let first = body_id(&create_article(&app, &app.alice, "First").await);
    let second = body_id(&create_article(&app, &app.bob, "Second").await);

    let (_, root) = app
        .send(
            Method::POST,
            "/comments",
            Some(&token(&app.bob)),
            Some(json!({"content": "root", "article": first})),
        )
        .await;
    app.send(
        Method::POST,
        &format!("/comments/{}/add_reply", body_id(&root)),
        Some(&token(&app.alice)),
        Some(json!({"content": "reply"})),
    )
    .await;
    app.send(
        Method::POST,
        "/comments",
        Some(&token(&app.alice)),
        Some(json!({"content": "other thread", "article_id": second})),
    )
    .await;

    let (status, listing) = app.send(Method::GET, "/comments", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let listing = listing.as_array().unwrap();
    assert_eq!(listing.len(), 3);
    assert_eq!(listing[0]["id"], root["id"]);
    assert_eq!(listing[0]["reply_count"], 1);
    assert_eq!(listing[1]["content"], "reply");
    assert_eq!(listing[2]["article_id"], second);

    // a well-formed token for a user row that no longer exists
    let ghost = EntUser { id: 999, ..app.bob.clone() };
    let (status, _) = app
        .send(
            Method::POST,
            "/comments",
            Some(&token(&ghost)),
            Some(json!({"content": "boo", "article_id": first})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
