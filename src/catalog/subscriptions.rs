/// Viewer-to-creator subscriptions
use crate::{
    catalog::users::Author,
    db,
    error::{ApiError, ApiResult},
    pagination::{self, CreatorKey, Page},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub viewer_id: String,
    pub creator_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    fn from_row(row: &SqliteRow) -> ApiResult<Self> {
        Ok(Self {
            viewer_id: row.try_get("viewer_id")?,
            creator_id: row.try_get("creator_id")?,
            created_at: db::datetime_from_ms(row.try_get("created_at")?),
            updated_at: db::datetime_from_ms(row.try_get("updated_at")?),
        })
    }
}

/// One entry in the viewer's subscription listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionItem {
    pub creator: SubscribedCreator,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribedCreator {
    #[serde(flatten)]
    pub author: Author,
    pub subscriber_count: i64,
}

#[derive(Clone)]
pub struct SubscriptionManager {
    db: SqlitePool,
}

impl SubscriptionManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Subscribe the viewer to a creator. Repeat calls return the existing
    /// subscription unchanged.
    pub async fn subscribe(&self, viewer_id: &str, creator_id: &str) -> ApiResult<Subscription> {
        if viewer_id == creator_id {
            return Err(ApiError::Validation(
                "Cannot subscribe to yourself".to_string(),
            ));
        }
        let creator: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
            .bind(creator_id)
            .fetch_optional(&self.db)
            .await?;
        if creator.is_none() {
            return Err(ApiError::NotFound("Creator not found".to_string()));
        }

        let now = db::now_ms();
        let inserted = sqlx::query(
            "INSERT INTO subscriptions (viewer_id, creator_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?) ON CONFLICT (viewer_id, creator_id) DO NOTHING",
        )
        .bind(viewer_id)
        .bind(creator_id)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;
        if inserted.rows_affected() > 0 {
            info!(viewer_id, creator_id, "subscription created");
        }

        let row = sqlx::query(
            "SELECT * FROM subscriptions WHERE viewer_id = ? AND creator_id = ?",
        )
        .bind(viewer_id)
        .bind(creator_id)
        .fetch_one(&self.db)
        .await?;
        Subscription::from_row(&row)
    }

    pub async fn unsubscribe(&self, viewer_id: &str, creator_id: &str) -> ApiResult<()> {
        if viewer_id == creator_id {
            return Err(ApiError::Validation(
                "Cannot unsubscribe from yourself".to_string(),
            ));
        }
        let result = sqlx::query(
            "DELETE FROM subscriptions WHERE viewer_id = ? AND creator_id = ?",
        )
        .bind(viewer_id)
        .bind(creator_id)
        .execute(&self.db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Subscription not found".to_string()));
        }
        info!(viewer_id, creator_id, "subscription removed");
        Ok(())
    }

    /// The viewer's subscriptions, most recently touched first, creator id
    /// breaking ties.
    pub async fn list(
        &self,
        viewer_id: &str,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> ApiResult<Page<SubscriptionItem>> {
        pagination::fetch_page(
            cursor,
            limit,
            |anchor, take| self.fetch_rows(viewer_id, anchor, take),
            |item: &SubscriptionItem| CreatorKey {
                updated_at: item.updated_at.timestamp_millis(),
                creator_id: item.creator.author.id.clone(),
            },
        )
        .await
    }

    async fn fetch_rows(
        &self,
        viewer_id: &str,
        anchor: Option<CreatorKey>,
        take: i64,
    ) -> ApiResult<Vec<SubscriptionItem>> {
        let mut sql = String::from(
            "SELECT s.creator_id, s.created_at, s.updated_at, \
             u.name AS creator_name, u.image_url AS creator_image_url, \
             (SELECT COUNT(*) FROM subscriptions s2 WHERE s2.creator_id = s.creator_id) \
                 AS subscriber_count \
             FROM subscriptions s JOIN users u ON u.id = s.creator_id \
             WHERE s.viewer_id = ?",
        );
        if anchor.is_some() {
            sql.push_str(
                " AND (s.updated_at < ? OR (s.updated_at = ? AND s.creator_id < ?))",
            );
        }
        sql.push_str(" ORDER BY s.updated_at DESC, s.creator_id DESC LIMIT ?");

        let mut query = sqlx::query(&sql).bind(viewer_id);
        if let Some(key) = &anchor {
            query = query
                .bind(key.updated_at)
                .bind(key.updated_at)
                .bind(&key.creator_id);
        }
        let rows = query.bind(take).fetch_all(&self.db).await?;

        rows.iter()
            .map(|row| {
                Ok(SubscriptionItem {
                    creator: SubscribedCreator {
                        author: Author {
                            id: row.try_get("creator_id")?,
                            name: row.try_get("creator_name")?,
                            image_url: row.try_get("creator_image_url")?,
                        },
                        subscriber_count: row.try_get("subscriber_count")?,
                    },
                    created_at: db::datetime_from_ms(row.try_get("created_at")?),
                    updated_at: db::datetime_from_ms(row.try_get("updated_at")?),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_manager() -> (SqlitePool, SubscriptionManager) {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        for id in ["u-viewer", "u-a", "u-b", "u-c"] {
            sqlx::query(
                "INSERT INTO users (id, subject, name, created_at, updated_at) \
                 VALUES (?, ?, ?, 0, 0)",
            )
            .bind(id)
            .bind(format!("gw|{id}"))
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();
        }
        (pool.clone(), SubscriptionManager::new(pool))
    }

    #[tokio::test]
    async fn cannot_subscribe_to_yourself() {
        let (_pool, manager) = seeded_manager().await;
        let err = manager.subscribe("u-a", "u-a").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn subscribing_to_a_missing_creator_is_not_found() {
        let (_pool, manager) = seeded_manager().await;
        let err = manager.subscribe("u-viewer", "u-gone").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn subscribe_is_idempotent() {
        let (pool, manager) = seeded_manager().await;

        let first = manager.subscribe("u-viewer", "u-a").await.unwrap();
        let again = manager.subscribe("u-viewer", "u-a").await.unwrap();

        assert_eq!(first.created_at, again.created_at);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn unsubscribing_when_not_subscribed_is_not_found() {
        let (_pool, manager) = seeded_manager().await;
        let err = manager.unsubscribe("u-viewer", "u-a").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn subscribe_then_unsubscribe_round_trips() {
        let (pool, manager) = seeded_manager().await;

        manager.subscribe("u-viewer", "u-a").await.unwrap();
        manager.unsubscribe("u-viewer", "u-a").await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn listing_pages_through_every_subscription() {
        let (pool, manager) = seeded_manager().await;

        // controlled timestamps, u-b and u-c tied
        for (creator, updated_at) in [("u-a", 3000), ("u-b", 2000), ("u-c", 2000)] {
            sqlx::query(
                "INSERT INTO subscriptions (viewer_id, creator_id, created_at, updated_at) \
                 VALUES ('u-viewer', ?, ?, ?)",
            )
            .bind(creator)
            .bind(updated_at)
            .bind(updated_at)
            .execute(&pool)
            .await
            .unwrap();
        }

        let page1 = manager.list("u-viewer", None, Some(2)).await.unwrap();
        let ids: Vec<&str> = page1
            .items
            .iter()
            .map(|i| i.creator.author.id.as_str())
            .collect();
        assert_eq!(ids, ["u-a", "u-c"]);
        assert_eq!(page1.items[0].creator.subscriber_count, 1);

        let page2 = manager
            .list("u-viewer", page1.next_cursor.as_deref(), Some(2))
            .await
            .unwrap();
        let ids: Vec<&str> = page2
            .items
            .iter()
            .map(|i| i.creator.author.id.as_str())
            .collect();
        assert_eq!(ids, ["u-b"]);
        assert!(page2.next_cursor.is_none());
    }
}
