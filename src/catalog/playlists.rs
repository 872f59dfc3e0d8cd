/// Playlists plus the two synthetic collections (liked videos, watch
/// history) that page by the viewer's own activity timestamps instead of the
/// video's recency.
use crate::{
    catalog::users::Author,
    catalog::videos::{self, VideoListItem},
    db,
    error::{ApiError, ApiResult},
    pagination::{self, LikedAtKey, Page, RecencyKey, ViewedAtKey},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Playlist {
    fn from_row(row: &SqliteRow) -> ApiResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            created_at: db::datetime_from_ms(row.try_get("created_at")?),
            updated_at: db::datetime_from_ms(row.try_get("updated_at")?),
        })
    }
}

/// A playlist shelf entry. The thumbnail comes from the most recently added
/// video; `contains_video` is only populated by the save-to-playlist listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistListItem {
    #[serde(flatten)]
    pub playlist: Playlist,
    pub user: Author,
    pub video_count: i64,
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contains_video: Option<bool>,
}

impl PlaylistListItem {
    fn from_row(row: &SqliteRow, with_containment: bool) -> ApiResult<Self> {
        let contains_video = if with_containment {
            Some(row.try_get("contains_video")?)
        } else {
            None
        };
        Ok(Self {
            playlist: Playlist::from_row(row)?,
            user: Author {
                id: row.try_get("author_id")?,
                name: row.try_get("author_name")?,
                image_url: row.try_get("author_image_url")?,
            },
            video_count: row.try_get("video_count")?,
            thumbnail_url: row.try_get("thumbnail_url")?,
            contains_video,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikedVideoItem {
    #[serde(flatten)]
    pub video: VideoListItem,
    pub liked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryVideoItem {
    #[serde(flatten)]
    pub video: VideoListItem,
    pub viewed_at: DateTime<Utc>,
}

const PLAYLIST_COLUMNS: &str = "p.id, p.user_id, p.name, p.description, p.created_at, \
    p.updated_at, u.id AS author_id, u.name AS author_name, u.image_url AS author_image_url, \
    (SELECT COUNT(*) FROM playlist_videos pv WHERE pv.playlist_id = p.id) AS video_count, \
    (SELECT v.thumbnail_url FROM playlist_videos pv JOIN videos v ON v.id = pv.video_id \
        WHERE pv.playlist_id = p.id ORDER BY pv.created_at DESC LIMIT 1) AS thumbnail_url";

#[derive(Clone)]
pub struct PlaylistLibrary {
    db: SqlitePool,
}

impl PlaylistLibrary {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        owner_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> ApiResult<Playlist> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::Validation(
                "Playlist name cannot be empty".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let now = db::now_ms();
        sqlx::query(
            "INSERT INTO playlists (id, user_id, name, description, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(owner_id)
        .bind(name)
        .bind(description)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;
        info!(playlist_id = %id, owner_id, "playlist created");
        self.get_one(owner_id, &id).await
    }

    pub async fn get_one(&self, owner_id: &str, playlist_id: &str) -> ApiResult<Playlist> {
        let row = sqlx::query("SELECT * FROM playlists WHERE id = ? AND user_id = ?")
            .bind(playlist_id)
            .bind(owner_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Playlist not found".to_string()))?;
        Playlist::from_row(&row)
    }

    pub async fn remove(&self, owner_id: &str, playlist_id: &str) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM playlists WHERE id = ? AND user_id = ?")
            .bind(playlist_id)
            .bind(owner_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Playlist not found".to_string()));
        }
        info!(playlist_id, "playlist removed");
        Ok(())
    }

    /// The owner's playlist shelf, newest first.
    pub async fn list(
        &self,
        owner_id: &str,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> ApiResult<Page<PlaylistListItem>> {
        pagination::fetch_page(
            cursor,
            limit,
            |anchor, take| self.fetch_shelf(owner_id, None, anchor, take),
            playlist_key,
        )
        .await
    }

    /// The shelf again, but flagged with whether each playlist already holds
    /// the given video. Backs the save-to-playlist dialog.
    pub async fn list_for_video(
        &self,
        owner_id: &str,
        video_id: &str,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> ApiResult<Page<PlaylistListItem>> {
        pagination::fetch_page(
            cursor,
            limit,
            |anchor, take| self.fetch_shelf(owner_id, Some(video_id), anchor, take),
            playlist_key,
        )
        .await
    }

    async fn fetch_shelf(
        &self,
        owner_id: &str,
        video_id: Option<&str>,
        anchor: Option<RecencyKey>,
        take: i64,
    ) -> ApiResult<Vec<PlaylistListItem>> {
        let mut sql = format!("SELECT {PLAYLIST_COLUMNS}");
        if video_id.is_some() {
            sql.push_str(
                ", EXISTS(SELECT 1 FROM playlist_videos pv \
                 WHERE pv.playlist_id = p.id AND pv.video_id = ?) AS contains_video",
            );
        }
        sql.push_str(" FROM playlists p JOIN users u ON u.id = p.user_id WHERE p.user_id = ?");
        if anchor.is_some() {
            sql.push_str(" AND (p.updated_at < ? OR (p.updated_at = ? AND p.id < ?))");
        }
        sql.push_str(" ORDER BY p.updated_at DESC, p.id DESC LIMIT ?");

        let mut query = sqlx::query(&sql);
        if let Some(video_id) = video_id {
            query = query.bind(video_id);
        }
        query = query.bind(owner_id);
        if let Some(key) = &anchor {
            query = query.bind(key.updated_at).bind(key.updated_at).bind(&key.id);
        }
        let rows = query.bind(take).fetch_all(&self.db).await?;
        rows.iter()
            .map(|row| PlaylistListItem::from_row(row, video_id.is_some()))
            .collect()
    }

    pub async fn add_video(
        &self,
        owner_id: &str,
        playlist_id: &str,
        video_id: &str,
    ) -> ApiResult<()> {
        self.get_one(owner_id, playlist_id).await?;
        let video: Option<String> = sqlx::query_scalar("SELECT id FROM videos WHERE id = ?")
            .bind(video_id)
            .fetch_optional(&self.db)
            .await?;
        if video.is_none() {
            return Err(ApiError::NotFound("Video not found".to_string()));
        }
        if self.contains(playlist_id, video_id).await? {
            return Err(ApiError::Conflict(
                "Video is already in the playlist".to_string(),
            ));
        }

        let now = db::now_ms();
        sqlx::query(
            "INSERT INTO playlist_videos (playlist_id, video_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(playlist_id)
        .bind(video_id)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;
        info!(playlist_id, video_id, "video added to playlist");
        Ok(())
    }

    pub async fn remove_video(
        &self,
        owner_id: &str,
        playlist_id: &str,
        video_id: &str,
    ) -> ApiResult<()> {
        self.get_one(owner_id, playlist_id).await?;
        let video: Option<String> = sqlx::query_scalar("SELECT id FROM videos WHERE id = ?")
            .bind(video_id)
            .fetch_optional(&self.db)
            .await?;
        if video.is_none() {
            return Err(ApiError::NotFound("Video not found".to_string()));
        }
        if !self.contains(playlist_id, video_id).await? {
            return Err(ApiError::Conflict(
                "Video is not in the playlist".to_string(),
            ));
        }

        sqlx::query("DELETE FROM playlist_videos WHERE playlist_id = ? AND video_id = ?")
            .bind(playlist_id)
            .bind(video_id)
            .execute(&self.db)
            .await?;
        info!(playlist_id, video_id, "video removed from playlist");
        Ok(())
    }

    async fn contains(&self, playlist_id: &str, video_id: &str) -> ApiResult<bool> {
        let found: Option<String> = sqlx::query_scalar(
            "SELECT video_id FROM playlist_videos WHERE playlist_id = ? AND video_id = ?",
        )
        .bind(playlist_id)
        .bind(video_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(found.is_some())
    }

    /// The videos saved to one playlist. Owner-only, and the owner sees
    /// everything they saved, private uploads included.
    pub async fn list_videos(
        &self,
        owner_id: &str,
        playlist_id: &str,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> ApiResult<Page<VideoListItem>> {
        self.get_one(owner_id, playlist_id).await?;
        pagination::fetch_page(
            cursor,
            limit,
            |anchor, take| self.fetch_playlist_videos(playlist_id, anchor, take),
            videos::recency_key,
        )
        .await
    }

    async fn fetch_playlist_videos(
        &self,
        playlist_id: &str,
        anchor: Option<RecencyKey>,
        take: i64,
    ) -> ApiResult<Vec<VideoListItem>> {
        let mut sql = format!(
            "SELECT {} FROM videos v \
             JOIN users u ON u.id = v.user_id \
             JOIN playlist_videos pm ON pm.video_id = v.id AND pm.playlist_id = ?",
            videos::VIDEO_LIST_COLUMNS
        );
        if anchor.is_some() {
            sql.push_str(" WHERE (v.updated_at < ? OR (v.updated_at = ? AND v.id < ?))");
        }
        sql.push_str(" ORDER BY v.updated_at DESC, v.id DESC LIMIT ?");

        let mut query = sqlx::query(&sql).bind(playlist_id);
        if let Some(key) = &anchor {
            query = query.bind(key.updated_at).bind(key.updated_at).bind(&key.id);
        }
        let rows = query.bind(take).fetch_all(&self.db).await?;
        rows.iter().map(videos::list_item_from_row).collect()
    }

    /// Public videos the viewer has liked, most recent reaction first. The
    /// reaction row's updated_at is the like time, so re-liking a video moves
    /// it back to the top.
    pub async fn list_liked(
        &self,
        viewer_id: &str,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> ApiResult<Page<LikedVideoItem>> {
        pagination::fetch_page(
            cursor,
            limit,
            |anchor, take| self.fetch_liked(viewer_id, anchor, take),
            |item: &LikedVideoItem| LikedAtKey {
                liked_at: item.liked_at.timestamp_millis(),
                id: item.video.video.id.clone(),
            },
        )
        .await
    }

    async fn fetch_liked(
        &self,
        viewer_id: &str,
        anchor: Option<LikedAtKey>,
        take: i64,
    ) -> ApiResult<Vec<LikedVideoItem>> {
        let mut sql = format!(
            "SELECT {}, rx.updated_at AS liked_at FROM videos v \
             JOIN users u ON u.id = v.user_id \
             JOIN reactions rx ON rx.target_kind = 'video' AND rx.target_id = v.id \
                 AND rx.actor_id = ? AND rx.kind = 'like' \
             WHERE v.visibility = 'public'",
            videos::VIDEO_LIST_COLUMNS
        );
        if anchor.is_some() {
            sql.push_str(" AND (rx.updated_at < ? OR (rx.updated_at = ? AND v.id < ?))");
        }
        sql.push_str(" ORDER BY rx.updated_at DESC, v.id DESC LIMIT ?");

        let mut query = sqlx::query(&sql).bind(viewer_id);
        if let Some(key) = &anchor {
            query = query.bind(key.liked_at).bind(key.liked_at).bind(&key.id);
        }
        let rows = query.bind(take).fetch_all(&self.db).await?;
        rows.iter()
            .map(|row| {
                Ok(LikedVideoItem {
                    video: videos::list_item_from_row(row)?,
                    liked_at: db::datetime_from_ms(row.try_get("liked_at")?),
                })
            })
            .collect()
    }

    /// Public videos the viewer has watched, most recent view first.
    pub async fn list_history(
        &self,
        viewer_id: &str,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> ApiResult<Page<HistoryVideoItem>> {
        pagination::fetch_page(
            cursor,
            limit,
            |anchor, take| self.fetch_history(viewer_id, anchor, take),
            |item: &HistoryVideoItem| ViewedAtKey {
                viewed_at: item.viewed_at.timestamp_millis(),
                id: item.video.video.id.clone(),
            },
        )
        .await
    }

    async fn fetch_history(
        &self,
        viewer_id: &str,
        anchor: Option<ViewedAtKey>,
        take: i64,
    ) -> ApiResult<Vec<HistoryVideoItem>> {
        let mut sql = format!(
            "SELECT {}, vw.updated_at AS viewed_at FROM videos v \
             JOIN users u ON u.id = v.user_id \
             JOIN video_views vw ON vw.video_id = v.id AND vw.user_id = ? \
             WHERE v.visibility = 'public'",
            videos::VIDEO_LIST_COLUMNS
        );
        if anchor.is_some() {
            sql.push_str(" AND (vw.updated_at < ? OR (vw.updated_at = ? AND v.id < ?))");
        }
        sql.push_str(" ORDER BY vw.updated_at DESC, v.id DESC LIMIT ?");

        let mut query = sqlx::query(&sql).bind(viewer_id);
        if let Some(key) = &anchor {
            query = query.bind(key.viewed_at).bind(key.viewed_at).bind(&key.id);
        }
        let rows = query.bind(take).fetch_all(&self.db).await?;
        rows.iter()
            .map(|row| {
                Ok(HistoryVideoItem {
                    video: videos::list_item_from_row(row)?,
                    viewed_at: db::datetime_from_ms(row.try_get("viewed_at")?),
                })
            })
            .collect()
    }
}

fn playlist_key(item: &PlaylistListItem) -> RecencyKey {
    RecencyKey {
        updated_at: item.playlist.updated_at.timestamp_millis(),
        id: item.playlist.id.clone(),
    }
}
