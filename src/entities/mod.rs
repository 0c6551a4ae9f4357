// Blog entities - plain records mapped from SQLite rows

pub mod ent_article;
pub mod ent_comment;
pub mod ent_taxonomy;
pub mod ent_user;

pub use ent_article::EntArticle;
pub use ent_comment::EntComment;
pub use ent_taxonomy::{EntCategory, EntTag};
pub use ent_user::EntUser;

use sqlx::sqlite::SqliteRow;

use crate::ent_framework::ent_privacy::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    EntUser,
    EntArticle,
    EntComment,
    EntTag,
    EntCategory,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::EntUser => "user",
            EntityType::EntArticle => "article",
            EntityType::EntComment => "comment",
            EntityType::EntTag => "tag",
            EntityType::EntCategory => "category",
        }
    }
}

// Entity trait that all blog entities implement
pub trait Entity: Clone + Send + Sync {
    fn entity_type() -> EntityType;

    /// How the privacy rules see this entity
    fn privacy_resource(&self) -> Resource;

    fn not_found(id: i64) -> crate::error::AppError {
        crate::error::AppError::NotFound(format!(
            "{} with id {} not found",
            Self::entity_type().as_str(),
            id
        ))
    }
}

/// Row decoding for entities stored in a single row
pub trait FromSqliteRow: Sized {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error>;
}
