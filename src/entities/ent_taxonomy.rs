// EntTag / EntCategory - flat named entities with a derived slug

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

use super::{Entity, EntityType, FromSqliteRow};
use crate::ent_framework::ent_privacy::Resource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntTag {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntCategory {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for EntTag {
    fn entity_type() -> EntityType {
        EntityType::EntTag
    }

    fn privacy_resource(&self) -> Resource {
        Resource::Tag
    }
}

impl Entity for EntCategory {
    fn entity_type() -> EntityType {
        EntityType::EntCategory
    }

    fn privacy_resource(&self) -> Resource {
        Resource::Category
    }
}

impl FromSqliteRow for EntTag {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(EntTag {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
        })
    }
}

impl FromSqliteRow for EntCategory {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(EntCategory {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            slug: row.try_get("slug")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
