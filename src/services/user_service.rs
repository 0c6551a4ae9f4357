// UserService - staff-only user administration, site statistics and the activity log

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    database::{ActivityRecord, BlogDatabase},
    ent_framework::ent_privacy::{authorize, PrivacyOperation, Resource},
    entities::{EntUser, Entity},
    error::{AppError, AppResult},
    infrastructure::{
        actor::Actor,
        audit::{AuditAction, AuditEvent, AuditLog},
        auth::AuthFailure,
    },
};

pub const DEFAULT_ACTIVITY_LIMIT: i64 = 100;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SiteStatistics {
    pub total_users: i64,
    pub total_articles: i64,
    pub total_comments: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub user: Option<i64>,
    pub user_username: Option<String>,
    pub action_type: String,
    pub action_display: String,
    pub timestamp: DateTime<Utc>,
    pub details: String,
}

impl From<ActivityRecord> for ActivityEntry {
    fn from(record: ActivityRecord) -> Self {
        let action_display = AuditAction::parse(&record.action_type)
            .map(|action| action.display().to_string())
            .unwrap_or_else(|| record.action_type.clone());
        Self {
            id: record.id,
            user: record.user_id,
            user_username: record.user_username,
            action_type: record.action_type,
            action_display,
            timestamp: record.timestamp,
            details: record.details,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub is_staff: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub is_staff: Option<bool>,
}

/// Fields a user may change on their own record
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub email: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    db: Arc<BlogDatabase>,
    audit: AuditLog,
}

impl UserService {
    pub fn new(db: Arc<BlogDatabase>, audit: AuditLog) -> Self {
        Self { db, audit }
    }

    /// The authenticated actor's own record
    pub async fn me(&self, actor: &Actor) -> AppResult<EntUser> {
        let user_id = actor
            .id
            .filter(|_| actor.is_authenticated())
            .ok_or(AppError::Unauthenticated(AuthFailure::Missing))?;
        self.db
            .get_user(user_id)
            .await?
            .ok_or_else(|| EntUser::not_found(user_id))
    }

    /// Self-service update; staff status is only changed through the admin surface
    pub async fn update_me(&self, actor: &Actor, changes: ProfileChanges) -> AppResult<EntUser> {
        let me = self.me(actor).await?;
        let Some(email) = changes.email.as_deref().map(str::trim) else {
            return Ok(me);
        };
        if !self.db.update_user(me.id, Some(email), None).await? {
            return Err(EntUser::not_found(me.id));
        }
        let user = self
            .db
            .get_user(me.id)
            .await?
            .ok_or_else(|| EntUser::not_found(me.id))?;

        tracing::info!(user_id = user.id, "profile updated");
        self.audit
            .emit(AuditEvent::new(
                actor.id,
                AuditAction::UserUpdated,
                format!("User {} updated", user.username),
            ))
            .await;
        Ok(user)
    }

    pub async fn list_users(&self, actor: &Actor) -> AppResult<Vec<EntUser>> {
        authorize(actor, PrivacyOperation::Read, Resource::User)?;
        self.db.list_users().await
    }

    pub async fn get_user(&self, actor: &Actor, user_id: i64) -> AppResult<EntUser> {
        authorize(actor, PrivacyOperation::Read, Resource::User)?;
        self.db
            .get_user(user_id)
            .await?
            .ok_or_else(|| EntUser::not_found(user_id))
    }

    pub async fn create_user(&self, actor: &Actor, input: NewUser) -> AppResult<EntUser> {
        authorize(actor, PrivacyOperation::Create, Resource::User)?;
        let username = input.username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("username may not be blank".to_string()));
        }

        let user = self.db.create_user(username, input.email.trim(), input.is_staff).await?;
        tracing::info!(user_id = user.id, username = %user.username, "user registered");
        self.audit
            .emit(AuditEvent::new(
                actor.id,
                AuditAction::UserRegistered,
                format!("User {} registered", user.username),
            ))
            .await;
        Ok(user)
    }

    pub async fn update_user(&self, actor: &Actor, user_id: i64, changes: UserChanges) -> AppResult<EntUser> {
        authorize(actor, PrivacyOperation::Update, Resource::User)?;
        let email = changes.email.as_deref().map(str::trim);
        if !self.db.update_user(user_id, email, changes.is_staff).await? {
            return Err(EntUser::not_found(user_id));
        }
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| EntUser::not_found(user_id))?;

        tracing::info!(user_id, is_staff = user.is_staff, "user updated");
        self.audit
            .emit(AuditEvent::new(
                actor.id,
                AuditAction::UserUpdated,
                format!("User {} updated", user.username),
            ))
            .await;
        Ok(user)
    }

    /// Removes the user together with their articles and comments
    pub async fn delete_user(&self, actor: &Actor, user_id: i64) -> AppResult<()> {
        authorize(actor, PrivacyOperation::Delete, Resource::User)?;
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| EntUser::not_found(user_id))?;

        let mut tx = self.db.begin_transaction().await?;
        if !self.db.delete_user_tx(&mut tx, user_id).await? {
            tx.rollback().await?;
            return Err(EntUser::not_found(user_id));
        }
        tx.commit().await?;

        tracing::info!(user_id, username = %user.username, "user deleted");
        // the deleted user's own id would be nulled out, so attribute to the acting admin
        self.audit
            .emit(AuditEvent::new(
                actor.id.filter(|id| *id != user_id),
                AuditAction::UserDeleted,
                format!("User {} deleted", user.username),
            ))
            .await;
        Ok(())
    }

    pub async fn site_statistics(&self, actor: &Actor) -> AppResult<SiteStatistics> {
        authorize(actor, PrivacyOperation::Read, Resource::SiteStatistics)?;
        Ok(SiteStatistics {
            total_users: self.db.count_rows("users").await?,
            total_articles: self.db.count_rows("articles").await?,
            total_comments: self.db.count_rows("comments").await?,
        })
    }

    /// Newest first
    pub async fn activity_log(&self, actor: &Actor, limit: Option<i64>) -> AppResult<Vec<ActivityEntry>> {
        authorize(actor, PrivacyOperation::Read, Resource::ActivityLog)?;
        let limit = limit.filter(|l| *l > 0).unwrap_or(DEFAULT_ACTIVITY_LIMIT);
        let records = self.db.list_activity(limit).await?;
        Ok(records.into_iter().map(ActivityEntry::from).collect())
    }

    /// Make sure `username` exists and is staff; used once at boot
    pub async fn ensure_admin(&self, username: &str) -> AppResult<EntUser> {
        match self.db.get_user_by_username(username).await? {
            Some(user) if user.is_staff => Ok(user),
            Some(user) => {
                self.db.update_user(user.id, None, Some(true)).await?;
                tracing::info!(user_id = user.id, username, "promoted bootstrap admin");
                self.db
                    .get_user(user.id)
                    .await?
                    .ok_or_else(|| EntUser::not_found(user.id))
            }
            None => {
                let user = self.db.create_user(username, "", true).await?;
                tracing::info!(user_id = user.id, username, "created bootstrap admin");
                self.audit
                    .emit(AuditEvent::new(
                        None,
                        AuditAction::UserRegistered,
                        format!("User {} registered", user.username),
                    ))
                    .await;
                Ok(user)
            }
        }
    }
}
