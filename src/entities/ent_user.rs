// EntUser - blog user record (identity lives with the auth provider)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

use super::{Entity, EntityType, FromSqliteRow};
use crate::ent_framework::ent_privacy::Resource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

impl Entity for EntUser {
    fn entity_type() -> EntityType {
        EntityType::EntUser
    }

    fn privacy_resource(&self) -> Resource {
        Resource::User
    }
}

impl FromSqliteRow for EntUser {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(EntUser {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            is_staff: row.try_get("is_staff")?,
            date_joined: row.try_get("date_joined")?,
        })
    }
}
