// CommentService - the comment tree store
// Every mutation: load target, consult privacy rules, write, then emit audit events

use std::sync::Arc;

use crate::{
    database::BlogDatabase,
    ent_framework::ent_privacy::{authorize, PrivacyOperation, Resource},
    entities::{EntArticle, EntComment, Entity},
    error::{AppError, AppResult},
    infrastructure::{
        actor::Actor,
        audit::{AuditAction, AuditEvent, AuditLog},
    },
};

/// Client input for a new comment. The author is never taken from the client.
#[derive(Debug, Clone, Default)]
pub struct NewComment {
    pub article_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub content: String,
}

/// PATCH payload. `article_id`/`parent_id` are only accepted when they repeat the stored values.
#[derive(Debug, Clone, Default)]
pub struct CommentChanges {
    pub content: Option<String>,
    pub article_id: Option<i64>,
    pub parent_id: Option<i64>,
}

#[derive(Clone)]
pub struct CommentService {
    db: Arc<BlogDatabase>,
    audit: AuditLog,
}

fn validate_content(content: &str) -> AppResult<()> {
    if content.trim().is_empty() {
        return Err(AppError::Validation("Comment content may not be blank".to_string()));
    }
    Ok(())
}

impl CommentService {
    pub fn new(db: Arc<BlogDatabase>, audit: AuditLog) -> Self {
        Self { db, audit }
    }

    pub async fn get(&self, comment_id: i64) -> AppResult<EntComment> {
        self.db
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| EntComment::not_found(comment_id))
    }

    pub async fn create(&self, actor: &Actor, input: NewComment) -> AppResult<EntComment> {
        let author_id = actor.id.unwrap_or_default();
        authorize(actor, PrivacyOperation::Create, Resource::Comment { author_id })?;
        validate_content(&input.content)?;

        // checks and insert share one transaction; a vanished target is NotFound
        let mut tx = self.db.begin_transaction().await?;
        if let Some(article_id) = input.article_id {
            if self.db.get_article_tx(&mut tx, article_id).await?.is_none() {
                return Err(EntArticle::not_found(article_id));
            }
        }

        let article_id = match input.parent_id {
            Some(parent_id) => {
                let parent = self.db.get_comment_tx(&mut tx, parent_id).await?.ok_or_else(|| {
                    AppError::NotFound(format!("Parent comment {} not found", parent_id))
                })?;
                match input.article_id {
                    Some(article_id) if article_id != parent.article_id => {
                        return Err(AppError::Validation(format!(
                            "parent/article mismatch: comment {} belongs to article {}, not {}",
                            parent_id, parent.article_id, article_id
                        )));
                    }
                    _ => parent.article_id,
                }
            }
            None => input.article_id.ok_or_else(|| {
                AppError::Validation("article_id is required for a root comment".to_string())
            })?,
        };

        let comment = self
            .db
            .insert_comment_tx(&mut tx, article_id, author_id, input.parent_id, &input.content)
            .await?;
        tx.commit().await?;

        tracing::info!(
            comment_id = comment.id,
            article_id = comment.article_id,
            parent_id = ?comment.parent_id,
            author_id = comment.author_id,
            "comment created"
        );
        let details = self.describe(&comment).await;
        self.audit
            .emit(AuditEvent::new(actor.id, AuditAction::CommentCreated, details))
            .await;

        Ok(comment)
    }

    /// Reply to `comment_id`; article and parent come from the target comment
    pub async fn add_reply(&self, actor: &Actor, comment_id: i64, content: String) -> AppResult<EntComment> {
        self.create(
            actor,
            NewComment { article_id: None, parent_id: Some(comment_id), content },
        )
        .await
    }

    pub async fn update(&self, actor: &Actor, comment_id: i64, changes: CommentChanges) -> AppResult<EntComment> {
        let comment = self.get(comment_id).await?;
        authorize(actor, PrivacyOperation::Update, comment.privacy_resource())?;

        if changes.article_id.is_some_and(|id| id != comment.article_id) {
            return Err(AppError::Validation("Comments cannot be moved to another article".to_string()));
        }
        if changes.parent_id.is_some() && changes.parent_id != comment.parent_id {
            return Err(AppError::Validation("Comments cannot be re-parented".to_string()));
        }

        let Some(content) = changes.content else {
            return Ok(comment);
        };
        validate_content(&content)?;

        let updated = self
            .db
            .update_comment_content(comment_id, &content)
            .await?
            .ok_or_else(|| EntComment::not_found(comment_id))?;

        tracing::info!(comment_id, actor_id = ?actor.id, "comment updated");
        let details = self.describe(&updated).await;
        self.audit
            .emit(AuditEvent::new(actor.id, AuditAction::CommentUpdated, details))
            .await;

        Ok(updated)
    }

    /// Delete the comment and every descendant in one transaction.
    /// Returns the number of removed rows.
    pub async fn delete(&self, actor: &Actor, comment_id: i64) -> AppResult<usize> {
        let comment = self.get(comment_id).await?;
        authorize(actor, PrivacyOperation::Delete, comment.privacy_resource())?;
        let article_title = self.article_title(comment.article_id).await;

        let mut tx = self.db.begin_transaction().await?;
        let subtree = self.db.comment_subtree_tx(&mut tx, comment_id).await?;
        if subtree.is_empty() {
            // removed by a concurrent request after the permission check
            tx.rollback().await?;
            return Err(EntComment::not_found(comment_id));
        }

        let mut removed = 0u64;
        for node in &subtree {
            tracing::debug!(comment_id = node.id, parent_id = ?node.parent_id, "deleting comment");
            removed += self.db.delete_comment_tx(&mut tx, node.id).await?;
        }
        tx.commit().await?;

        tracing::info!(
            comment_id,
            removed,
            actor_id = ?actor.id,
            "comment thread deleted"
        );

        let events = subtree
            .iter()
            .map(|node| {
                AuditEvent::new(
                    actor.id,
                    AuditAction::CommentDeleted,
                    format!(
                        "Comment (ID: {}) on article '{}' by {}",
                        node.id, article_title, node.author_name
                    ),
                )
            })
            .collect();
        self.audit.emit_all(events).await;

        Ok(removed as usize)
    }

    /// Every comment across all articles, oldest first
    pub async fn list_all(&self) -> AppResult<Vec<EntComment>> {
        self.db.list_comments().await
    }

    pub async fn list_root_comments(&self, article_id: i64) -> AppResult<Vec<EntComment>> {
        self.ensure_article(article_id).await?;
        self.db.list_root_comments(article_id).await
    }

    pub async fn list_replies(&self, comment_id: i64) -> AppResult<Vec<EntComment>> {
        self.get(comment_id).await?;
        self.db.list_replies(comment_id).await
    }

    pub async fn count_replies(&self, comment_id: i64) -> AppResult<i64> {
        self.db.count_replies(comment_id).await
    }

    async fn ensure_article(&self, article_id: i64) -> AppResult<()> {
        if self.db.article_exists(article_id).await? {
            Ok(())
        } else {
            Err(EntArticle::not_found(article_id))
        }
    }

    async fn article_title(&self, article_id: i64) -> String {
        match self.db.get_article(article_id).await {
            Ok(Some(article)) => article.title,
            _ => format!("#{}", article_id),
        }
    }

    async fn describe(&self, comment: &EntComment) -> String {
        format!(
            "Comment (ID: {}) on article '{}' by {}",
            comment.id,
            self.article_title(comment.article_id).await,
            comment.author_name
        )
    }
}
