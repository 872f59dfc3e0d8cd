/// Accounts for gateway-verified identities
///
/// The platform never sees credentials. The gateway authenticates the caller
/// and forwards a stable subject; accounts are provisioned lazily the first
/// time a subject shows up, and profile fields refresh whenever the gateway
/// supplies newer ones.
use crate::{
    db,
    error::{ApiError, ApiResult},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub subject: String,
    pub name: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub(crate) fn from_row(row: &SqliteRow) -> ApiResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            subject: row.try_get("subject")?,
            name: row.try_get("name")?,
            image_url: row.try_get("image_url")?,
            created_at: db::datetime_from_ms(row.try_get("created_at")?),
            updated_at: db::datetime_from_ms(row.try_get("updated_at")?),
        })
    }
}

/// Creator fields embedded in list items across the catalog
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
}

/// A channel page: the account plus its public stats
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub video_count: i64,
    pub subscriber_count: i64,
    pub viewer_subscribed: bool,
}

#[derive(Clone)]
pub struct UserDirectory {
    db: SqlitePool,
}

impl UserDirectory {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn find_by_subject(&self, subject: &str) -> ApiResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE subject = ?")
            .bind(subject)
            .fetch_optional(&self.db)
            .await?;
        row.as_ref().map(User::from_row).transpose()
    }

    pub async fn find_by_id(&self, user_id: &str) -> ApiResult<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        row.as_ref().map(User::from_row).transpose()
    }

    /// Create or refresh the account behind a verified subject.
    /// Name and image only overwrite when the gateway sent changed values.
    pub async fn provision(
        &self,
        subject: &str,
        name: Option<&str>,
        image_url: Option<&str>,
    ) -> ApiResult<User> {
        if let Some(existing) = self.find_by_subject(subject).await? {
            let new_name = name.filter(|n| *n != existing.name);
            let new_image = image_url.filter(|i| existing.image_url.as_deref() != Some(*i));
            if new_name.is_none() && new_image.is_none() {
                return Ok(existing);
            }
            sqlx::query(
                "UPDATE users SET name = COALESCE(?, name), \
                 image_url = COALESCE(?, image_url), updated_at = ? WHERE id = ?",
            )
            .bind(new_name)
            .bind(new_image)
            .bind(db::now_ms())
            .bind(&existing.id)
            .execute(&self.db)
            .await?;
        } else {
            let now = db::now_ms();
            // DO NOTHING absorbs the race when two first requests arrive at once
            sqlx::query(
                "INSERT INTO users (id, subject, name, image_url, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?) ON CONFLICT (subject) DO NOTHING",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(subject)
            .bind(name.unwrap_or(subject))
            .bind(image_url)
            .bind(now)
            .bind(now)
            .execute(&self.db)
            .await?;
            info!(subject, "account provisioned");
        }

        self.find_by_subject(subject)
            .await?
            .ok_or_else(|| ApiError::Internal("Account provisioning failed".to_string()))
    }

    /// Channel page data. The video count covers everything the user
    /// uploaded, drafts included.
    pub async fn get_profile(
        &self,
        user_id: &str,
        viewer_id: Option<&str>,
    ) -> ApiResult<UserProfile> {
        let row = sqlx::query(
            "SELECT u.*, \
             (SELECT COUNT(*) FROM videos v WHERE v.user_id = u.id) AS video_count, \
             (SELECT COUNT(*) FROM subscriptions s WHERE s.creator_id = u.id) AS subscriber_count, \
             EXISTS(SELECT 1 FROM subscriptions s \
                    WHERE s.creator_id = u.id AND s.viewer_id = ?) AS viewer_subscribed \
             FROM users u WHERE u.id = ?",
        )
        .bind(viewer_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        Ok(UserProfile {
            user: User::from_row(&row)?,
            video_count: row.try_get("video_count")?,
            subscriber_count: row.try_get("subscriber_count")?,
            viewer_subscribed: row.try_get("viewer_subscribed")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_directory() -> (SqlitePool, UserDirectory) {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        (pool.clone(), UserDirectory::new(pool))
    }

    #[tokio::test]
    async fn provision_creates_once_and_reuses() {
        let (pool, directory) = test_directory().await;

        let first = directory
            .provision("gw|1234", Some("Ada"), None)
            .await
            .unwrap();
        let second = directory
            .provision("gw|1234", Some("Ada"), None)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Ada");
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn provision_without_a_name_falls_back_to_the_subject() {
        let (_pool, directory) = test_directory().await;
        let user = directory.provision("gw|anon", None, None).await.unwrap();
        assert_eq!(user.name, "gw|anon");
    }

    #[tokio::test]
    async fn provision_refreshes_changed_profile_fields() {
        let (_pool, directory) = test_directory().await;

        directory
            .provision("gw|1234", Some("Ada"), None)
            .await
            .unwrap();
        let updated = directory
            .provision("gw|1234", Some("Ada L."), Some("https://img.example/a.png"))
            .await
            .unwrap();

        assert_eq!(updated.name, "Ada L.");
        assert_eq!(
            updated.image_url.as_deref(),
            Some("https://img.example/a.png")
        );
    }

    #[tokio::test]
    async fn profile_reports_counts_and_viewer_flag() {
        let (pool, directory) = test_directory().await;

        let creator = directory
            .provision("gw|creator", Some("Creator"), None)
            .await
            .unwrap();
        let viewer = directory
            .provision("gw|viewer", Some("Viewer"), None)
            .await
            .unwrap();

        sqlx::query(
            "INSERT INTO videos (id, user_id, title, created_at, updated_at) \
             VALUES ('v-1', ?, 'Clip', 0, 0)",
        )
        .bind(&creator.id)
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO subscriptions (viewer_id, creator_id, created_at, updated_at) \
             VALUES (?, ?, 0, 0)",
        )
        .bind(&viewer.id)
        .bind(&creator.id)
        .execute(&pool)
        .await
        .unwrap();

        let profile = directory
            .get_profile(&creator.id, Some(&viewer.id))
            .await
            .unwrap();
        assert_eq!(profile.video_count, 1);
        assert_eq!(profile.subscriber_count, 1);
        assert!(profile.viewer_subscribed);

        let anonymous = directory.get_profile(&creator.id, None).await.unwrap();
        assert!(!anonymous.viewer_subscribed);
    }

    #[tokio::test]
    async fn unknown_profile_is_not_found() {
        let (_pool, directory) = test_directory().await;
        let err = directory.get_profile("nope", None).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
