// CommentViewService - renders comments as nested, depth-bounded threads
// Each node queries its own children, so a thread costs one query per rendered node

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use std::sync::Arc;

use crate::{
    database::BlogDatabase,
    ent_framework::ent_privacy::{can, PrivacyOperation},
    entities::{EntComment, Entity},
    error::AppResult,
    infrastructure::actor::Actor,
};

/// Deepest level whose children are still expanded
pub const MAX_REPLY_DEPTH: usize = 2;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommentView {
    pub id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub article_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_author: bool,
    pub is_admin: bool,
    pub can_delete: bool,
    /// True number of direct children, also when `replies` was cut off
    pub reply_count: i64,
    pub replies: Vec<CommentView>,
}

impl CommentView {
    fn new(comment: EntComment, actor: &Actor, reply_count: i64, replies: Vec<CommentView>) -> Self {
        let can_delete = can(actor, PrivacyOperation::Delete, comment.privacy_resource());
        Self {
            is_author: actor.is_author_of(comment.author_id),
            is_admin: actor.is_staff(),
            can_delete,
            id: comment.id,
            author_id: comment.author_id,
            author_name: comment.author_name,
            article_id: comment.article_id,
            parent_id: comment.parent_id,
            content: comment.content,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            reply_count,
            replies,
        }
    }

    /// Children exist that this payload does not carry
    pub fn is_truncated(&self) -> bool {
        self.reply_count > 0 && self.replies.is_empty()
    }
}

#[derive(Clone)]
pub struct CommentViewService {
    db: Arc<BlogDatabase>,
}

impl CommentViewService {
    pub fn new(db: Arc<BlogDatabase>) -> Self {
        Self { db }
    }

    /// Render `comment` at `depth`. Past `max_depth` the replies list stays
    /// empty while `reply_count` still reports the real number of children.
    pub fn render<'a>(
        &'a self,
        actor: &'a Actor,
        comment: EntComment,
        depth: usize,
        max_depth: usize,
    ) -> BoxFuture<'a, AppResult<CommentView>> {
        Box::pin(async move {
            if depth > max_depth {
                let reply_count = self.db.count_replies(comment.id).await?;
                return Ok(CommentView::new(comment, actor, reply_count, Vec::new()));
            }

            let children = self.db.list_replies(comment.id).await?;
            let reply_count = children.len() as i64;
            let mut replies = Vec::with_capacity(children.len());
            for child in children {
                replies.push(self.render(actor, child, depth + 1, max_depth).await?);
            }
            Ok(CommentView::new(comment, actor, reply_count, replies))
        })
    }

    pub async fn render_comment(&self, actor: &Actor, comment: EntComment) -> AppResult<CommentView> {
        self.render(actor, comment, 0, MAX_REPLY_DEPTH).await
    }

    /// Render each comment as its own thread starting at depth 0
    pub async fn render_many(&self, actor: &Actor, comments: Vec<EntComment>) -> AppResult<Vec<CommentView>> {
        let mut views = Vec::with_capacity(comments.len());
        for comment in comments {
            views.push(self.render_comment(actor, comment).await?);
        }
        Ok(views)
    }
}
