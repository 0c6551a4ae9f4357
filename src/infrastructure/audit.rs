// Audit trail - explicit activity events emitted at the end of store operations
// Sinks may fail; the AuditLog facade swallows failures so requests never do

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use std::fmt;
use std::sync::Arc;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    UserRegistered,
    UserUpdated,
    UserDeleted,
    ArticleCreated,
    ArticleUpdated,
    ArticleDeleted,
    CommentCreated,
    CommentUpdated,
    CommentDeleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UserRegistered => "USER_REGISTERED",
            AuditAction::UserUpdated => "USER_UPDATED",
            AuditAction::UserDeleted => "USER_DELETED",
            AuditAction::ArticleCreated => "ARTICLE_CREATED",
            AuditAction::ArticleUpdated => "ARTICLE_UPDATED",
            AuditAction::ArticleDeleted => "ARTICLE_DELETED",
            AuditAction::CommentCreated => "COMMENT_CREATED",
            AuditAction::CommentUpdated => "COMMENT_UPDATED",
            AuditAction::CommentDeleted => "COMMENT_DELETED",
        }
    }

    /// Human-readable label shown in the admin activity listing
    pub fn display(&self) -> &'static str {
        match self {
            AuditAction::UserRegistered => "User Registered",
            AuditAction::UserUpdated => "User Updated",
            AuditAction::UserDeleted => "User Deleted",
            AuditAction::ArticleCreated => "Article Created",
            AuditAction::ArticleUpdated => "Article Updated",
            AuditAction::ArticleDeleted => "Article Deleted",
            AuditAction::CommentCreated => "Comment Created",
            AuditAction::CommentUpdated => "Comment Updated",
            AuditAction::CommentDeleted => "Comment Deleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let action = match value {
            "USER_REGISTERED" => AuditAction::UserRegistered,
            "USER_UPDATED" => AuditAction::UserUpdated,
            "USER_DELETED" => AuditAction::UserDeleted,
            "ARTICLE_CREATED" => AuditAction::ArticleCreated,
            "ARTICLE_UPDATED" => AuditAction::ArticleUpdated,
            "ARTICLE_DELETED" => AuditAction::ArticleDeleted,
            "COMMENT_CREATED" => AuditAction::CommentCreated,
            "COMMENT_UPDATED" => AuditAction::CommentUpdated,
            "COMMENT_DELETED" => AuditAction::CommentDeleted,
            _ => return None,
        };
        Some(action)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub actor_id: Option<i64>,
    pub action: AuditAction,
    pub details: String,
}

impl AuditEvent {
    pub fn new(actor_id: Option<i64>, action: AuditAction, details: impl Into<String>) -> Self {
        Self { actor_id, action, details: details.into() }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> AppResult<()>;
}

/// Persists events into the `activity_log` table
pub struct DatabaseAuditSink {
    pool: SqlitePool,
}

impl DatabaseAuditSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for DatabaseAuditSink {
    async fn record(&self, event: &AuditEvent) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO activity_log (user_id, action_type, timestamp, details) VALUES (?, ?, ?, ?)",
        )
        .bind(event.actor_id)
        .bind(event.action.as_str())
        .bind(chrono::Utc::now())
        .bind(&event.details)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to record activity {}: {}", event.action, e)))?;
        Ok(())
    }
}

/// Writes events to the log stream only
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &AuditEvent) -> AppResult<()> {
        tracing::info!(
            actor_id = ?event.actor_id,
            action = event.action.as_str(),
            "{}",
            event.details
        );
        Ok(())
    }
}

/// Fire-and-forget front for an AuditSink
#[derive(Clone)]
pub struct AuditLog {
    sink: Arc<dyn AuditSink>,
}

impl AuditLog {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub async fn emit(&self, event: AuditEvent) {
        if let Err(e) = self.sink.record(&event).await {
            tracing::warn!(
                action = event.action.as_str(),
                "Failed to create activity log: {}",
                e
            );
        }
    }

    pub async fn emit_all(&self, events: Vec<AuditEvent>) {
        for event in events {
            self.emit(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn record(&self, _event: &AuditEvent) -> AppResult<()> {
            Err(AppError::Database("activity_log is gone".into()))
        }
    }

    #[derive(Default)]
    struct MemorySink(Mutex<Vec<AuditEvent>>);

    #[async_trait]
    impl AuditSink for MemorySink {
        async fn record(&self, event: &AuditEvent) -> AppResult<()> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failing_sink_is_swallowed() {
        let log = AuditLog::new(Arc::new(FailingSink));
        log.emit(AuditEvent::new(Some(1), AuditAction::CommentDeleted, "Comment (ID: 1)")).await;
    }

    #[tokio::test]
    async fn test_emit_all_keeps_order() {
        let sink = Arc::new(MemorySink::default());
        let log = AuditLog::new(sink.clone());
        log.emit_all(vec![
            AuditEvent::new(Some(1), AuditAction::CommentDeleted, "a"),
            AuditEvent::new(Some(1), AuditAction::CommentDeleted, "b"),
        ])
        .await;
        let recorded = sink.0.lock().unwrap();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].details, "a");
    }

    #[test]
    fn test_action_names_round_trip() {
        assert_eq!(AuditAction::parse("COMMENT_DELETED"), Some(AuditAction::CommentDeleted));
        assert_eq!(AuditAction::ArticleCreated.display(), "Article Created");
        assert_eq!(AuditAction::parse("UNKNOWN"), None);
    }
}
