/// Per-viewer view records
///
/// One row per (viewer, video), so a view count is a row count and watching
/// a video twice never inflates it. The row's updated_at doubles as the
/// watch-history sort key.
use crate::{
    db,
    error::{ApiError, ApiResult},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoView {
    pub user_id: String,
    pub video_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoView {
    fn from_row(row: &SqliteRow) -> ApiResult<Self> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            video_id: row.try_get("video_id")?,
            created_at: db::datetime_from_ms(row.try_get("created_at")?),
            updated_at: db::datetime_from_ms(row.try_get("updated_at")?),
        })
    }
}

#[derive(Clone)]
pub struct ViewTracker {
    db: SqlitePool,
}

impl ViewTracker {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Record that the viewer watched the video. Re-watching returns the
    /// existing record untouched.
    pub async fn record(&self, user_id: &str, video_id: &str) -> ApiResult<VideoView> {
        let video: Option<String> = sqlx::query_scalar("SELECT id FROM videos WHERE id = ?")
            .bind(video_id)
            .fetch_optional(&self.db)
            .await?;
        if video.is_none() {
            return Err(ApiError::NotFound("Video not found".to_string()));
        }

        let now = db::now_ms();
        sqlx::query(
            "INSERT INTO video_views (user_id, video_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?) ON CONFLICT (user_id, video_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(video_id)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        let row = sqlx::query("SELECT * FROM video_views WHERE user_id = ? AND video_id = ?")
            .bind(user_id)
            .bind(video_id)
            .fetch_one(&self.db)
            .await?;
        VideoView::from_row(&row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_tracker() -> (SqlitePool, ViewTracker) {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        sqlx::query(
            "INSERT INTO users (id, subject, name, created_at, updated_at) \
             VALUES ('u-1', 'gw|1', 'Viewer', 0, 0)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO videos (id, user_id, title, created_at, updated_at) \
             VALUES ('v-1', 'u-1', 'Clip', 0, 0)",
        )
        .execute(&pool)
        .await
        .unwrap();
        (pool.clone(), ViewTracker::new(pool))
    }

    #[tokio::test]
    async fn repeat_views_count_once() {
        let (pool, tracker) = seeded_tracker().await;

        let first = tracker.record("u-1", "v-1").await.unwrap();
        let second = tracker.record("u-1", "v-1").await.unwrap();

        assert_eq!(first.created_at, second.created_at);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM video_views")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn viewing_a_missing_video_is_not_found() {
        let (pool, tracker) = seeded_tracker().await;

        let err = tracker.record("u-1", "v-gone").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM video_views")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
