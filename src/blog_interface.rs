// Blog Interface - HTTP surface of the CMS
// Handlers stay thin: extract, call one service, shape the response

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    database::{ArticleChanges, BlogDatabase},
    entities::{EntArticle, EntCategory, EntTag, EntUser},
    error::AppResult,
    infrastructure::{
        audit::AuditLog,
        auth::AuthProvider,
        middleware::{actor_middleware, CurrentActor},
    },
    services::{
        ArticleInput, ArticleService, ActivityEntry, CommentChanges, CommentService, CommentView,
        CommentViewService, NewComment, NewUser, ProfileChanges, SiteStatistics, TaxonomyChanges, TaxonomyInput,
        TaxonomyService, UserChanges, UserService,
    },
};

/// All services behind the router; cheap to clone per request
#[derive(Clone)]
pub struct BlogInterface {
    db: Arc<BlogDatabase>,
    pub articles: ArticleService,
    pub comments: CommentService,
    pub comment_views: CommentViewService,
    pub taxonomy: TaxonomyService,
    pub users: UserService,
}

impl BlogInterface {
    pub fn new(db: Arc<BlogDatabase>, audit: AuditLog) -> Self {
        Self {
            articles: ArticleService::new(db.clone(), audit.clone()),
            comments: CommentService::new(db.clone(), audit.clone()),
            comment_views: CommentViewService::new(db.clone()),
            taxonomy: TaxonomyService::new(db.clone()),
            users: UserService::new(db.clone(), audit),
            db,
        }
    }

    pub fn database(&self) -> Arc<BlogDatabase> {
        self.db.clone()
    }
}

// HTTP Request types

#[derive(Deserialize)]
pub struct CreateArticleRequest {
    pub title: String,
    pub content: String,
    #[serde(default, alias = "author")]
    pub author_id: Option<i64>,
    #[serde(default, alias = "categories")]
    pub category_ids: Vec<i64>,
    #[serde(default, alias = "tags")]
    pub tag_ids: Vec<i64>,
}

#[derive(Deserialize)]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(alias = "categories")]
    pub category_ids: Option<Vec<i64>>,
    #[serde(alias = "tags")]
    pub tag_ids: Option<Vec<i64>>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct ArticleCommentRequest {
    pub content: String,
    #[serde(default, alias = "parent")]
    pub parent_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    #[serde(default, alias = "article")]
    pub article_id: Option<i64>,
    #[serde(default, alias = "parent")]
    pub parent_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct UpdateCommentRequest {
    pub content: Option<String>,
    #[serde(alias = "article")]
    pub article_id: Option<i64>,
    #[serde(alias = "parent")]
    pub parent_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct ReplyRequest {
    pub content: String,
}

#[derive(Deserialize)]
pub struct TaxonomyRequest {
    pub name: String,
    pub description: Option<String>,
    pub slug: Option<String>,
}

#[derive(Deserialize)]
pub struct TaxonomyUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub slug: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub is_staff: bool,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub is_staff: Option<bool>,
}

/// Unknown fields such as `is_staff` are ignored
#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
}

// HTTP Handlers

pub async fn health_handler(State(blog): State<BlogInterface>) -> AppResult<Json<Value>> {
    blog.database().health_check().await?;
    Ok(Json(json!({"status": "ok"})))
}

// ---- articles ----

pub async fn list_articles_handler(State(blog): State<BlogInterface>) -> AppResult<Json<Vec<EntArticle>>> {
    Ok(Json(blog.articles.list().await?))
}

pub async fn search_articles_handler(
    State(blog): State<BlogInterface>,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<Vec<EntArticle>>> {
    Ok(Json(blog.articles.search(params.q.as_deref()).await?))
}

pub async fn get_article_handler(
    State(blog): State<BlogInterface>,
    Path(id): Path<i64>,
) -> AppResult<Json<EntArticle>> {
    Ok(Json(blog.articles.get(id).await?))
}

pub async fn create_article_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Json(req): Json<CreateArticleRequest>,
) -> AppResult<(StatusCode, Json<EntArticle>)> {
    let input = ArticleInput {
        title: req.title,
        content: req.content,
        author_id: req.author_id,
        category_ids: req.category_ids,
        tag_ids: req.tag_ids,
    };
    let article = blog.articles.create(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

pub async fn update_article_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Path(id): Path<i64>,
    Json(req): Json<UpdateArticleRequest>,
) -> AppResult<Json<EntArticle>> {
    let changes = ArticleChanges {
        title: req.title,
        content: req.content,
        category_ids: req.category_ids,
        tag_ids: req.tag_ids,
    };
    Ok(Json(blog.articles.update(&actor, id, changes).await?))
}

pub async fn delete_article_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    blog.articles.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- comments ----

pub async fn list_article_comments_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Path(article_id): Path<i64>,
) -> AppResult<Json<Vec<CommentView>>> {
    let roots = blog.comments.list_root_comments(article_id).await?;
    Ok(Json(blog.comment_views.render_many(&actor, roots).await?))
}

pub async fn create_article_comment_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Path(article_id): Path<i64>,
    Json(req): Json<ArticleCommentRequest>,
) -> AppResult<(StatusCode, Json<CommentView>)> {
    let input = NewComment {
        article_id: Some(article_id),
        parent_id: req.parent_id,
        content: req.content,
    };
    let comment = blog.comments.create(&actor, input).await?;
    let view = blog.comment_views.render_comment(&actor, comment).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Every comment, each rendered as the top of its own thread
pub async fn list_comments_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
) -> AppResult<Json<Vec<CommentView>>> {
    let comments = blog.comments.list_all().await?;
    Ok(Json(blog.comment_views.render_many(&actor, comments).await?))
}

pub async fn create_comment_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<CommentView>)> {
    let input = NewComment {
        article_id: req.article_id,
        parent_id: req.parent_id,
        content: req.content,
    };
    let comment = blog.comments.create(&actor, input).await?;
    let view = blog.comment_views.render_comment(&actor, comment).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_comment_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Path(id): Path<i64>,
) -> AppResult<Json<CommentView>> {
    let comment = blog.comments.get(id).await?;
    Ok(Json(blog.comment_views.render_comment(&actor, comment).await?))
}

pub async fn update_comment_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCommentRequest>,
) -> AppResult<Json<CommentView>> {
    let changes = CommentChanges {
        content: req.content,
        article_id: req.article_id,
        parent_id: req.parent_id,
    };
    let comment = blog.comments.update(&actor, id, changes).await?;
    Ok(Json(blog.comment_views.render_comment(&actor, comment).await?))
}

pub async fn delete_comment_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    blog.comments.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Direct children, each rendered as the top of its own thread
pub async fn list_replies_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<CommentView>>> {
    let replies = blog.comments.list_replies(id).await?;
    Ok(Json(blog.comment_views.render_many(&actor, replies).await?))
}

pub async fn add_reply_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Path(id): Path<i64>,
    Json(req): Json<ReplyRequest>,
) -> AppResult<(StatusCode, Json<CommentView>)> {
    let reply = blog.comments.add_reply(&actor, id, req.content).await?;
    let view = blog.comment_views.render_comment(&actor, reply).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

// ---- tags ----

pub async fn list_tags_handler(State(blog): State<BlogInterface>) -> AppResult<Json<Vec<EntTag>>> {
    Ok(Json(blog.taxonomy.list_tags().await?))
}

pub async fn get_tag_handler(State(blog): State<BlogInterface>, Path(id): Path<i64>) -> AppResult<Json<EntTag>> {
    Ok(Json(blog.taxonomy.get_tag(id).await?))
}

pub async fn create_tag_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Json(req): Json<TaxonomyRequest>,
) -> AppResult<(StatusCode, Json<EntTag>)> {
    let input = TaxonomyInput { name: req.name, description: None, slug: req.slug };
    let tag = blog.taxonomy.create_tag(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

pub async fn update_tag_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Path(id): Path<i64>,
    Json(req): Json<TaxonomyUpdateRequest>,
) -> AppResult<Json<EntTag>> {
    let changes = TaxonomyChanges { name: req.name, description: None, slug: req.slug };
    Ok(Json(blog.taxonomy.update_tag(&actor, id, changes).await?))
}

pub async fn delete_tag_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    blog.taxonomy.delete_tag(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- categories ----

pub async fn list_categories_handler(State(blog): State<BlogInterface>) -> AppResult<Json<Vec<EntCategory>>> {
    Ok(Json(blog.taxonomy.list_categories().await?))
}

pub async fn get_category_handler(
    State(blog): State<BlogInterface>,
    Path(id): Path<i64>,
) -> AppResult<Json<EntCategory>> {
    Ok(Json(blog.taxonomy.get_category(id).await?))
}

pub async fn create_category_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Json(req): Json<TaxonomyRequest>,
) -> AppResult<(StatusCode, Json<EntCategory>)> {
    let input = TaxonomyInput { name: req.name, description: req.description, slug: req.slug };
    let category = blog.taxonomy.create_category(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Path(id): Path<i64>,
    Json(req): Json<TaxonomyUpdateRequest>,
) -> AppResult<Json<EntCategory>> {
    let changes = TaxonomyChanges { name: req.name, description: req.description, slug: req.slug };
    Ok(Json(blog.taxonomy.update_category(&actor, id, changes).await?))
}

pub async fn delete_category_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    blog.taxonomy.delete_category(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- users & admin ----

pub async fn me_handler(State(blog): State<BlogInterface>, actor: CurrentActor) -> AppResult<Json<EntUser>> {
    Ok(Json(blog.users.me(&actor).await?))
}

pub async fn update_me_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Json<EntUser>> {
    let changes = ProfileChanges { email: req.email };
    Ok(Json(blog.users.update_me(&actor, changes).await?))
}

pub async fn list_users_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
) -> AppResult<Json<Vec<EntUser>>> {
    Ok(Json(blog.users.list_users(&actor).await?))
}

pub async fn get_user_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Path(id): Path<i64>,
) -> AppResult<Json<EntUser>> {
    Ok(Json(blog.users.get_user(&actor, id).await?))
}

pub async fn create_user_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<EntUser>)> {
    let input = NewUser { username: req.username, email: req.email, is_staff: req.is_staff };
    let user = blog.users.create_user(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<Json<EntUser>> {
    let changes = UserChanges { email: req.email, is_staff: req.is_staff };
    Ok(Json(blog.users.update_user(&actor, id, changes).await?))
}

pub async fn delete_user_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    blog.users.delete_user(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn site_stats_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
) -> AppResult<Json<SiteStatistics>> {
    Ok(Json(blog.users.site_statistics(&actor).await?))
}

pub async fn activity_handler(
    State(blog): State<BlogInterface>,
    actor: CurrentActor,
    Query(params): Query<ActivityQuery>,
) -> AppResult<Json<Vec<ActivityEntry>>> {
    Ok(Json(blog.users.activity_log(&actor, params.limit).await?))
}

// Create blog router
pub fn create_blog_router(blog: BlogInterface, auth: Arc<dyn AuthProvider>) -> Router {
    Router::new()
        .route("/health", get(health_handler))

        // Articles
        .route("/articles", get(list_articles_handler).post(create_article_handler))
        .route("/articles/search", get(search_articles_handler))
        .route(
            "/articles/{id}",
            get(get_article_handler)
                .patch(update_article_handler)
                .delete(delete_article_handler),
        )
        .route(
            "/articles/{id}/comments",
            get(list_article_comments_handler).post(create_article_comment_handler),
        )

        // Comments
        .route("/comments", get(list_comments_handler).post(create_comment_handler))
        .route(
            "/comments/{id}",
            get(get_comment_handler)
                .patch(update_comment_handler)
                .delete(delete_comment_handler),
        )
        .route("/comments/{id}/replies", get(list_replies_handler))
        .route("/comments/{id}/add_reply", post(add_reply_handler))

        // Taxonomy
        .route("/tags", get(list_tags_handler).post(create_tag_handler))
        .route(
            "/tags/{id}",
            get(get_tag_handler).patch(update_tag_handler).delete(delete_tag_handler),
        )
        .route("/categories", get(list_categories_handler).post(create_category_handler))
        .route(
            "/categories/{id}",
            get(get_category_handler)
                .patch(update_category_handler)
                .delete(delete_category_handler),
        )

        // Users
        .route("/users/me", get(me_handler).patch(update_me_handler))
        .route("/admin/users", get(list_users_handler).post(create_user_handler))
        .route(
            "/admin/users/{id}",
            get(get_user_handler).patch(update_user_handler).delete(delete_user_handler),
        )
        .route("/admin/stats", get(site_stats_handler))
        .route("/admin/activity", get(activity_handler))

        .with_state(blog)
        .layer(middleware::from_fn_with_state(auth, actor_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
