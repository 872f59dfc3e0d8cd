/// Seeded browse categories
use crate::{db, error::ApiResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    fn from_row(row: &SqliteRow) -> ApiResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            created_at: db::datetime_from_ms(row.try_get("created_at")?),
            updated_at: db::datetime_from_ms(row.try_get("updated_at")?),
        })
    }
}

#[derive(Clone)]
pub struct CategoryIndex {
    db: SqlitePool,
}

impl CategoryIndex {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// The full category set, alphabetical. Small and seeded by migration,
    /// so no paging.
    pub async fn list_all(&self) -> ApiResult<Vec<Category>> {
        let rows = sqlx::query("SELECT * FROM categories ORDER BY name ASC")
            .fetch_all(&self.db)
            .await?;
        rows.iter().map(Category::from_row).collect()
    }
}
