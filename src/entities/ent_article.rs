// EntArticle - authored post; categories and tags are link tables

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

use super::{Entity, EntityType, FromSqliteRow};
use crate::ent_framework::ent_privacy::Resource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntArticle {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub author_name: String,
    pub category_ids: Vec<i64>,
    pub tag_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for EntArticle {
    fn entity_type() -> EntityType {
        EntityType::EntArticle
    }

    fn privacy_resource(&self) -> Resource {
        Resource::Article { author_id: self.author_id }
    }
}

/// Link ids are loaded separately by the database layer
impl FromSqliteRow for EntArticle {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(EntArticle {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            author_id: row.try_get("author_id")?,
            author_name: row.try_get("author_name")?,
            category_ids: Vec::new(),
            tag_ids: Vec::new(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
