use axum::Router;
use std::sync::Arc;

use crate::{
    blog_interface::{create_blog_router, BlogInterface},
    config::Config,
    database::BlogDatabase,
    error::AppResult,
    infrastructure::{
        audit::{AuditLog, DatabaseAuditSink},
        auth::{AuthProvider, JwtAuthProvider},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub blog: BlogInterface,
    pub auth: Arc<dyn AuthProvider>,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        // Initialize database
        let database = BlogDatabase::connect(&config.database.url, config.database.max_connections).await?;
        let database = Arc::new(database);

        // Activity log lives next to the content it describes
        let audit = AuditLog::new(Arc::new(DatabaseAuditSink::new(database.pool.clone())));
        let blog = BlogInterface::new(database, audit);
        let auth: Arc<dyn AuthProvider> = Arc::new(JwtAuthProvider::new(&config.auth.jwt_secret));

        if let Some(username) = &config.bootstrap_admin {
            let admin = blog.users.ensure_admin(username).await?;
            tracing::info!(user_id = admin.id, username = %admin.username, "bootstrap admin ready");
        }

        Ok(Self { blog, auth, config })
    }

    pub fn router(&self) -> Router {
        create_blog_router(self.blog.clone(), self.auth.clone())
    }
}
