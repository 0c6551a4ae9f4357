// EntComment - one node of an article's reply tree
// Tree edges are parent_id references into the same flat table

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

use super::{Entity, EntityType, FromSqliteRow};
use crate::ent_framework::ent_privacy::Resource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntComment {
    pub id: i64,
    pub article_id: i64,
    pub author_id: i64,
    /// Username of the author, joined in on read
    pub author_name: String,
    pub parent_id: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for EntComment {
    fn entity_type() -> EntityType {
        EntityType::EntComment
    }

    fn privacy_resource(&self) -> Resource {
        Resource::Comment { author_id: self.author_id }
    }
}

impl FromSqliteRow for EntComment {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(EntComment {
            id: row.try_get("id")?,
            article_id: row.try_get("article_id")?,
            author_id: row.try_get("author_id")?,
            author_name: row.try_get("author_name")?,
            parent_id: row.try_get("parent_id")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
