// ArticleService - article CRUD and search
// Staff may file an article on behalf of another user; everyone else authors as themselves

use std::sync::Arc;

use crate::{
    database::{ArticleChanges, BlogDatabase, NewArticle, TaxonomyKind},
    ent_framework::ent_privacy::{authorize, PrivacyOperation, Resource},
    entities::{EntArticle, EntUser, Entity},
    error::{AppError, AppResult},
    infrastructure::{
        actor::Actor,
        audit::{AuditAction, AuditEvent, AuditLog},
    },
};

#[derive(Debug, Clone, Default)]
pub struct ArticleInput {
    pub title: String,
    pub content: String,
    /// Only honoured for staff
    pub author_id: Option<i64>,
    pub category_ids: Vec<i64>,
    pub tag_ids: Vec<i64>,
}

#[derive(Clone)]
pub struct ArticleService {
    db: Arc<BlogDatabase>,
    audit: AuditLog,
}

fn require_text(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} may not be blank", field)));
    }
    Ok(())
}

impl ArticleService {
    pub fn new(db: Arc<BlogDatabase>, audit: AuditLog) -> Self {
        Self { db, audit }
    }

    pub async fn list(&self) -> AppResult<Vec<EntArticle>> {
        self.db.list_articles().await
    }

    pub async fn get(&self, article_id: i64) -> AppResult<EntArticle> {
        self.db
            .get_article(article_id)
            .await?
            .ok_or_else(|| EntArticle::not_found(article_id))
    }

    /// Case-insensitive match on title, content, category or tag name.
    /// A blank query lists everything.
    pub async fn search(&self, query: Option<&str>) -> AppResult<Vec<EntArticle>> {
        match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => self.db.search_articles(q).await,
            None => self.list().await,
        }
    }

    pub async fn create(&self, actor: &Actor, input: ArticleInput) -> AppResult<EntArticle> {
        let own_id = actor.id.unwrap_or_default();
        authorize(actor, PrivacyOperation::Create, Resource::Article { author_id: own_id })?;
        require_text("title", &input.title)?;
        require_text("content", &input.content)?;

        let author = self.resolve_author(actor, input.author_id).await?;
        self.ensure_taxonomy(TaxonomyKind::Category, &input.category_ids).await?;
        self.ensure_taxonomy(TaxonomyKind::Tag, &input.tag_ids).await?;

        let new_article = NewArticle {
            title: input.title,
            content: input.content,
            author_id: author.id,
            category_ids: input.category_ids,
            tag_ids: input.tag_ids,
        };

        let mut tx = self.db.begin_transaction().await?;
        let article = self.db.create_article_tx(&mut tx, &new_article).await?;
        tx.commit().await?;

        tracing::info!(
            article_id = article.id,
            author_id = article.author_id,
            actor_id = ?actor.id,
            "article created"
        );
        self.audit
            .emit(AuditEvent::new(
                actor.id,
                AuditAction::ArticleCreated,
                format!("Article '{}' (ID: {}) by {}", article.title, article.id, article.author_name),
            ))
            .await;

        Ok(article)
    }

    pub async fn update(&self, actor: &Actor, article_id: i64, changes: ArticleChanges) -> AppResult<EntArticle> {
        let article = self.get(article_id).await?;
        authorize(actor, PrivacyOperation::Update, article.privacy_resource())?;

        if let Some(title) = &changes.title {
            require_text("title", title)?;
        }
        if let Some(content) = &changes.content {
            require_text("content", content)?;
        }
        if let Some(ids) = &changes.category_ids {
            self.ensure_taxonomy(TaxonomyKind::Category, ids).await?;
        }
        if let Some(ids) = &changes.tag_ids {
            self.ensure_taxonomy(TaxonomyKind::Tag, ids).await?;
        }

        let mut tx = self.db.begin_transaction().await?;
        let updated = self
            .db
            .update_article_tx(&mut tx, article_id, &changes)
            .await?
            .ok_or_else(|| EntArticle::not_found(article_id))?;
        tx.commit().await?;

        tracing::info!(article_id, actor_id = ?actor.id, "article updated");
        self.audit
            .emit(AuditEvent::new(
                actor.id,
                AuditAction::ArticleUpdated,
                format!("Article '{}' (ID: {}) by {}", updated.title, updated.id, updated.author_name),
            ))
            .await;

        Ok(updated)
    }

    /// Delete the article together with all of its comments.
    /// Returns how many comments went with it.
    pub async fn delete(&self, actor: &Actor, article_id: i64) -> AppResult<usize> {
        let article = self.get(article_id).await?;
        authorize(actor, PrivacyOperation::Delete, article.privacy_resource())?;

        let mut tx = self.db.begin_transaction().await?;
        let comments = self.db.article_comments_tx(&mut tx, article_id).await?;
        if !self.db.delete_article_tx(&mut tx, article_id).await? {
            tx.rollback().await?;
            return Err(EntArticle::not_found(article_id));
        }
        tx.commit().await?;

        tracing::info!(
            article_id,
            comments_removed = comments.len(),
            actor_id = ?actor.id,
            "article deleted"
        );

        let mut events = Vec::with_capacity(comments.len() + 1);
        events.push(AuditEvent::new(
            actor.id,
            AuditAction::ArticleDeleted,
            format!("Article '{}' (ID: {}) by {}", article.title, article.id, article.author_name),
        ));
        events.extend(comments.iter().map(|comment| {
            AuditEvent::new(
                actor.id,
                AuditAction::CommentDeleted,
                format!(
                    "Comment (ID: {}) on article '{}' by {}",
                    comment.id, article.title, comment.author_name
                ),
            )
        }));
        self.audit.emit_all(events).await;

        Ok(comments.len())
    }

    async fn resolve_author(&self, actor: &Actor, requested: Option<i64>) -> AppResult<EntUser> {
        let author_id = match (requested, actor.id) {
            (Some(requested), _) if actor.is_staff() => requested,
            (_, Some(own_id)) => own_id,
            (_, None) => return Err(AppError::Validation("Author not found.".to_string())),
        };
        self.db
            .get_user(author_id)
            .await?
            .ok_or_else(|| AppError::Validation("Author not found.".to_string()))
    }

    async fn ensure_taxonomy(&self, kind: TaxonomyKind, ids: &[i64]) -> AppResult<()> {
        let missing = self.db.missing_taxonomy_ids(kind, ids).await?;
        if missing.is_empty() {
            return Ok(());
        }
        let label = match kind {
            TaxonomyKind::Category => "category",
            TaxonomyKind::Tag => "tag",
        };
        Err(AppError::Validation(format!("Unknown {} ids: {:?}", label, missing)))
    }
}
