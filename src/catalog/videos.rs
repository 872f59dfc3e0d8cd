/// The video catalog: drafts, owner edits, and the public feeds
///
/// A video is created as a private draft the moment an upload is requested
/// and carries the correlation keys the transcoding pipeline will call back
/// with. Everything viewers see goes through the list queries here, which all
/// page by composite keyset (never OFFSET).
use crate::{
    catalog::users::Author,
    db,
    error::{ApiError, ApiResult},
    pagination::{self, Page, RecencyKey, ViewCountKey},
    reactions::ReactionKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

/// Where a video sits in the transcoding pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    Waiting,
    Created,
    Ready,
    Errored,
}

impl ProcessingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingState::Waiting => "waiting",
            ProcessingState::Created => "created",
            ProcessingState::Ready => "ready",
            ProcessingState::Errored => "errored",
        }
    }

    fn from_db(s: &str) -> Self {
        match s {
            "created" => ProcessingState::Created,
            "ready" => ProcessingState::Ready,
            "errored" => ProcessingState::Errored,
            _ => ProcessingState::Waiting,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Public => "public",
        }
    }

    fn from_db(s: &str) -> Self {
        match s {
            "public" => Visibility::Public,
            _ => Visibility::Private,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub user_id: String,
    pub category_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub upload_ref: Option<String>,
    pub asset_ref: Option<String>,
    pub status: ProcessingState,
    pub playback_id: Option<String>,
    pub track_ref: Option<String>,
    pub track_status: Option<String>,
    pub thumbnail_url: Option<String>,
    pub preview_url: Option<String>,
    pub duration_ms: i64,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    pub(crate) fn from_row(row: &SqliteRow) -> ApiResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            category_id: row.try_get("category_id")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            upload_ref: row.try_get("upload_ref")?,
            asset_ref: row.try_get("asset_ref")?,
            status: ProcessingState::from_db(&row.try_get::<String, _>("status")?),
            playback_id: row.try_get("playback_id")?,
            track_ref: row.try_get("track_ref")?,
            track_status: row.try_get("track_status")?,
            thumbnail_url: row.try_get("thumbnail_url")?,
            preview_url: row.try_get("preview_url")?,
            duration_ms: row.try_get("duration_ms")?,
            visibility: Visibility::from_db(&row.try_get::<String, _>("visibility")?),
            created_at: db::datetime_from_ms(row.try_get("created_at")?),
            updated_at: db::datetime_from_ms(row.try_get("updated_at")?),
        })
    }
}

/// A feed entry: the video, its author, and the aggregate counts
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListItem {
    #[serde(flatten)]
    pub video: Video,
    pub user: Author,
    pub view_count: i64,
    pub like_count: i64,
    pub dislike_count: i64,
}

/// The author block on a watch page
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInfo {
    #[serde(flatten)]
    pub author: Author,
    pub subscriber_count: i64,
    pub viewer_subscribed: bool,
}

/// Watch-page payload for a single video
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetail {
    #[serde(flatten)]
    pub video: Video,
    pub user: ChannelInfo,
    pub view_count: i64,
    pub like_count: i64,
    pub dislike_count: i64,
    pub viewer_reaction: Option<ReactionKind>,
}

/// Owner-editable fields. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub visibility: Option<Visibility>,
}

/// Select list shared by every video feed query. The author join and the
/// aggregate subqueries match what the list item deserializes.
pub(crate) const VIDEO_LIST_COLUMNS: &str = "v.id, v.user_id, v.category_id, v.title, \
    v.description, v.upload_ref, v.asset_ref, v.status, v.playback_id, v.track_ref, \
    v.track_status, v.thumbnail_url, v.preview_url, v.duration_ms, v.visibility, \
    v.created_at, v.updated_at, \
    u.id AS author_id, u.name AS author_name, u.image_url AS author_image_url, \
    (SELECT COUNT(*) FROM video_views vv WHERE vv.video_id = v.id) AS view_count, \
    (SELECT COUNT(*) FROM reactions r WHERE r.target_kind = 'video' \
        AND r.target_id = v.id AND r.kind = 'like') AS like_count, \
    (SELECT COUNT(*) FROM reactions r WHERE r.target_kind = 'video' \
        AND r.target_id = v.id AND r.kind = 'dislike') AS dislike_count";

const RECENCY_ANCHOR: &str = " AND (v.updated_at < ? OR (v.updated_at = ? AND v.id < ?))";
const VIEW_COUNT_EXPR: &str = "(SELECT COUNT(*) FROM video_views vv WHERE vv.video_id = v.id)";

pub(crate) fn list_item_from_row(row: &SqliteRow) -> ApiResult<VideoListItem> {
    Ok(VideoListItem {
        video: Video::from_row(row)?,
        user: Author {
            id: row.try_get("author_id")?,
            name: row.try_get("author_name")?,
            image_url: row.try_get("author_image_url")?,
        },
        view_count: row.try_get("view_count")?,
        like_count: row.try_get("like_count")?,
        dislike_count: row.try_get("dislike_count")?,
    })
}

pub(crate) fn recency_key(item: &VideoListItem) -> RecencyKey {
    RecencyKey {
        updated_at: item.video.updated_at.timestamp_millis(),
        id: item.video.id.clone(),
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[derive(Clone)]
pub struct VideoCatalog {
    db: SqlitePool,
    image_base_url: String,
}

impl VideoCatalog {
    pub fn new(db: SqlitePool, image_base_url: String) -> Self {
        Self { db, image_base_url }
    }

    /// Open a private draft carrying the upload reference the pipeline will
    /// correlate its callbacks with.
    pub async fn create(
        &self,
        owner_id: &str,
        upload_ref: &str,
        title: Option<&str>,
    ) -> ApiResult<Video> {
        let id = Uuid::new_v4().to_string();
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("Untitled");
        let now = db::now_ms();
        let result = sqlx::query(
            "INSERT INTO videos (id, user_id, title, upload_ref, status, visibility, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(owner_id)
        .bind(title)
        .bind(upload_ref)
        .bind(ProcessingState::Waiting.as_str())
        .bind(Visibility::Private.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await;
        match result {
            Ok(_) => {}
            Err(e) if db::is_unique_violation(&e) => {
                return Err(ApiError::Conflict(
                    "Upload reference already registered".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        }
        info!(video_id = %id, owner_id, upload_ref, "video draft opened");
        self.get_owner(owner_id, &id).await
    }

    /// Apply owner edits and bump the recency timestamp.
    pub async fn update(
        &self,
        owner_id: &str,
        video_id: &str,
        changes: VideoUpdate,
    ) -> ApiResult<Video> {
        if let Some(category_id) = changes.category_id.as_deref() {
            let known: Option<String> = sqlx::query_scalar("SELECT id FROM categories WHERE id = ?")
                .bind(category_id)
                .fetch_optional(&self.db)
                .await?;
            if known.is_none() {
                return Err(ApiError::NotFound("Category not found".to_string()));
            }
        }

        let result = sqlx::query(
            "UPDATE videos SET \
             title = COALESCE(?, title), \
             description = COALESCE(?, description), \
             category_id = COALESCE(?, category_id), \
             visibility = COALESCE(?, visibility), \
             updated_at = ? \
             WHERE id = ? AND user_id = ?",
        )
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(&changes.category_id)
        .bind(changes.visibility.map(|v| v.as_str()))
        .bind(db::now_ms())
        .bind(video_id)
        .bind(owner_id)
        .execute(&self.db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Video not found".to_string()));
        }
        self.get_owner(owner_id, video_id).await
    }

    pub async fn remove(&self, owner_id: &str, video_id: &str) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM videos WHERE id = ? AND user_id = ?")
            .bind(video_id)
            .bind(owner_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Video not found".to_string()));
        }
        info!(video_id, owner_id, "video removed by owner");
        Ok(())
    }

    /// Drop any custom thumbnail and fall back to the frame the pipeline
    /// serves for the playback id.
    pub async fn restore_thumbnail(&self, owner_id: &str, video_id: &str) -> ApiResult<Video> {
        let row = sqlx::query("SELECT playback_id FROM videos WHERE id = ? AND user_id = ?")
            .bind(video_id)
            .bind(owner_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Video not found".to_string()))?;
        let playback_id: Option<String> = row.try_get("playback_id")?;
        let Some(playback_id) = playback_id else {
            return Err(ApiError::Validation(
                "Video has no playback id yet".to_string(),
            ));
        };

        let thumbnail_url = crate::media::thumbnail_url(&self.image_base_url, &playback_id);
        sqlx::query(
            "UPDATE videos SET thumbnail_url = ?, thumbnail_key = NULL \
             WHERE id = ? AND user_id = ?",
        )
        .bind(&thumbnail_url)
        .bind(video_id)
        .bind(owner_id)
        .execute(&self.db)
        .await?;
        self.get_owner(owner_id, video_id).await
    }

    pub async fn exists(&self, video_id: &str) -> ApiResult<bool> {
        let found: Option<String> = sqlx::query_scalar("SELECT id FROM videos WHERE id = ?")
            .bind(video_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(found.is_some())
    }

    /// Delete drafts the pipeline never picked up. A row still `waiting`
    /// with no asset reference after the grace period means the upload was
    /// abandoned before any bytes arrived.
    pub async fn purge_stale_uploads(&self, grace_ms: i64) -> ApiResult<u64> {
        let cutoff = db::now_ms() - grace_ms;
        let result = sqlx::query(
            "DELETE FROM videos \
             WHERE status = 'waiting' AND asset_ref IS NULL AND created_at < ?",
        )
        .bind(cutoff)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Watch-page fetch. Visibility is not gated here: a direct link to a
    /// private video resolves, it just never appears in any feed.
    pub async fn get_one(
        &self,
        video_id: &str,
        viewer_id: Option<&str>,
    ) -> ApiResult<VideoDetail> {
        let sql = format!(
            "SELECT {VIDEO_LIST_COLUMNS}, \
             (SELECT COUNT(*) FROM subscriptions s WHERE s.creator_id = u.id) \
                 AS subscriber_count, \
             EXISTS(SELECT 1 FROM subscriptions s \
                    WHERE s.creator_id = u.id AND s.viewer_id = ?) AS viewer_subscribed, \
             (SELECT r.kind FROM reactions r WHERE r.actor_id = ? \
                    AND r.target_kind = 'video' AND r.target_id = v.id) AS viewer_reaction \
             FROM videos v JOIN users u ON u.id = v.user_id WHERE v.id = ?"
        );
        let row = sqlx::query(&sql)
            .bind(viewer_id)
            .bind(viewer_id)
            .bind(video_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Video not found".to_string()))?;

        let item = list_item_from_row(&row)?;
        let viewer_reaction = row
            .try_get::<Option<String>, _>("viewer_reaction")?
            .as_deref()
            .map(ReactionKind::from_str)
            .transpose()?;

        Ok(VideoDetail {
            video: item.video,
            user: ChannelInfo {
                author: item.user,
                subscriber_count: row.try_get("subscriber_count")?,
                viewer_subscribed: row.try_get("viewer_subscribed")?,
            },
            view_count: item.view_count,
            like_count: item.like_count,
            dislike_count: item.dislike_count,
            viewer_reaction,
        })
    }

    /// Owner fetch, drafts included.
    pub async fn get_owner(&self, owner_id: &str, video_id: &str) -> ApiResult<Video> {
        let row = sqlx::query("SELECT * FROM videos WHERE id = ? AND user_id = ?")
            .bind(video_id)
            .bind(owner_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Video not found".to_string()))?;
        Video::from_row(&row)
    }

    /// Studio listing: everything the owner uploaded, newest edits first.
    pub async fn list_owner(
        &self,
        owner_id: &str,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> ApiResult<Page<Video>> {
        pagination::fetch_page(
            cursor,
            limit,
            |anchor, take| self.fetch_owner_rows(owner_id, anchor, take),
            |video: &Video| RecencyKey {
                updated_at: video.updated_at.timestamp_millis(),
                id: video.id.clone(),
            },
        )
        .await
    }

    async fn fetch_owner_rows(
        &self,
        owner_id: &str,
        anchor: Option<RecencyKey>,
        take: i64,
    ) -> ApiResult<Vec<Video>> {
        let mut sql = String::from("SELECT * FROM videos v WHERE v.user_id = ?");
        if anchor.is_some() {
            sql.push_str(RECENCY_ANCHOR);
        }
        sql.push_str(" ORDER BY v.updated_at DESC, v.id DESC LIMIT ?");

        let mut query = sqlx::query(&sql).bind(owner_id);
        if let Some(key) = &anchor {
            query = query.bind(key.updated_at).bind(key.updated_at).bind(&key.id);
        }
        let rows = query.bind(take).fetch_all(&self.db).await?;
        rows.iter().map(Video::from_row).collect()
    }

    /// The home feed: public videos, optionally narrowed to one creator or
    /// one category.
    pub async fn list_public(
        &self,
        user_id: Option<&str>,
        category_id: Option<&str>,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> ApiResult<Page<VideoListItem>> {
        pagination::fetch_page(
            cursor,
            limit,
            |anchor, take| self.fetch_public(user_id, category_id, anchor, take),
            recency_key,
        )
        .await
    }

    async fn fetch_public(
        &self,
        user_id: Option<&str>,
        category_id: Option<&str>,
        anchor: Option<RecencyKey>,
        take: i64,
    ) -> ApiResult<Vec<VideoListItem>> {
        let mut sql = format!(
            "SELECT {VIDEO_LIST_COLUMNS} FROM videos v \
             JOIN users u ON u.id = v.user_id WHERE v.visibility = 'public'"
        );
        if user_id.is_some() {
            sql.push_str(" AND v.user_id = ?");
        }
        if category_id.is_some() {
            sql.push_str(" AND v.category_id = ?");
        }
        if anchor.is_some() {
            sql.push_str(RECENCY_ANCHOR);
        }
        sql.push_str(" ORDER BY v.updated_at DESC, v.id DESC LIMIT ?");

        let mut query = sqlx::query(&sql);
        if let Some(user_id) = user_id {
            query = query.bind(user_id);
        }
        if let Some(category_id) = category_id {
            query = query.bind(category_id);
        }
        if let Some(key) = &anchor {
            query = query.bind(key.updated_at).bind(key.updated_at).bind(&key.id);
        }
        let rows = query.bind(take).fetch_all(&self.db).await?;
        rows.iter().map(list_item_from_row).collect()
    }

    /// Most-viewed public videos. The view count is part of the sort key, so
    /// the anchor predicate repeats the counting subquery.
    pub async fn list_trending(
        &self,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> ApiResult<Page<VideoListItem>> {
        pagination::fetch_page(
            cursor,
            limit,
            |anchor, take| self.fetch_trending(anchor, take),
            |item: &VideoListItem| ViewCountKey {
                view_count: item.view_count,
                id: item.video.id.clone(),
            },
        )
        .await
    }

    async fn fetch_trending(
        &self,
        anchor: Option<ViewCountKey>,
        take: i64,
    ) -> ApiResult<Vec<VideoListItem>> {
        let mut sql = format!(
            "SELECT {VIDEO_LIST_COLUMNS} FROM videos v \
             JOIN users u ON u.id = v.user_id WHERE v.visibility = 'public'"
        );
        if anchor.is_some() {
            sql.push_str(&format!(
                " AND ({VIEW_COUNT_EXPR} < ? OR ({VIEW_COUNT_EXPR} = ? AND v.id < ?))"
            ));
        }
        sql.push_str(" ORDER BY view_count DESC, v.id DESC LIMIT ?");

        let mut query = sqlx::query(&sql);
        if let Some(key) = &anchor {
            query = query.bind(key.view_count).bind(key.view_count).bind(&key.id);
        }
        let rows = query.bind(take).fetch_all(&self.db).await?;
        rows.iter().map(list_item_from_row).collect()
    }

    /// Recent public uploads from creators the viewer subscribes to.
    pub async fn list_subscribed(
        &self,
        viewer_id: &str,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> ApiResult<Page<VideoListItem>> {
        pagination::fetch_page(
            cursor,
            limit,
            |anchor, take| self.fetch_subscribed(viewer_id, anchor, take),
            recency_key,
        )
        .await
    }

    async fn fetch_subscribed(
        &self,
        viewer_id: &str,
        anchor: Option<RecencyKey>,
        take: i64,
    ) -> ApiResult<Vec<VideoListItem>> {
        let mut sql = format!(
            "SELECT {VIDEO_LIST_COLUMNS} FROM videos v \
             JOIN users u ON u.id = v.user_id \
             JOIN subscriptions s ON s.creator_id = v.user_id AND s.viewer_id = ? \
             WHERE v.visibility = 'public'"
        );
        if anchor.is_some() {
            sql.push_str(RECENCY_ANCHOR);
        }
        sql.push_str(" ORDER BY v.updated_at DESC, v.id DESC LIMIT ?");

        let mut query = sqlx::query(&sql).bind(viewer_id);
        if let Some(key) = &anchor {
            query = query.bind(key.updated_at).bind(key.updated_at).bind(&key.id);
        }
        let rows = query.bind(take).fetch_all(&self.db).await?;
        rows.iter().map(list_item_from_row).collect()
    }

    /// Title search over the public catalog. LIKE wildcards in the query
    /// match literally.
    pub async fn search(
        &self,
        term: Option<&str>,
        category_id: Option<&str>,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> ApiResult<Page<VideoListItem>> {
        pagination::fetch_page(
            cursor,
            limit,
            |anchor, take| self.fetch_search(term, category_id, anchor, take),
            recency_key,
        )
        .await
    }

    async fn fetch_search(
        &self,
        term: Option<&str>,
        category_id: Option<&str>,
        anchor: Option<RecencyKey>,
        take: i64,
    ) -> ApiResult<Vec<VideoListItem>> {
        let mut sql = format!(
            "SELECT {VIDEO_LIST_COLUMNS} FROM videos v \
             JOIN users u ON u.id = v.user_id WHERE v.visibility = 'public'"
        );
        if term.is_some() {
            sql.push_str(" AND v.title LIKE ? ESCAPE '\\'");
        }
        if category_id.is_some() {
            sql.push_str(" AND v.category_id = ?");
        }
        if anchor.is_some() {
            sql.push_str(RECENCY_ANCHOR);
        }
        sql.push_str(" ORDER BY v.updated_at DESC, v.id DESC LIMIT ?");

        let mut query = sqlx::query(&sql);
        if let Some(term) = term {
            query = query.bind(format!("%{}%", escape_like(term)));
        }
        if let Some(category_id) = category_id {
            query = query.bind(category_id);
        }
        if let Some(key) = &anchor {
            query = query.bind(key.updated_at).bind(key.updated_at).bind(&key.id);
        }
        let rows = query.bind(take).fetch_all(&self.db).await?;
        rows.iter().map(list_item_from_row).collect()
    }

    /// Up-next rail for a watch page: public videos from the anchor's
    /// category (or the whole catalog when it has none), never the anchor
    /// itself.
    pub async fn list_suggested(
        &self,
        video_id: &str,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> ApiResult<Page<VideoListItem>> {
        let row = sqlx::query("SELECT category_id FROM videos WHERE id = ?")
            .bind(video_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Video not found".to_string()))?;
        let category_id: Option<String> = row.try_get("category_id")?;

        pagination::fetch_page(
            cursor,
            limit,
            |anchor, take| self.fetch_suggested(video_id, category_id.as_deref(), anchor, take),
            recency_key,
        )
        .await
    }

    async fn fetch_suggested(
        &self,
        video_id: &str,
        category_id: Option<&str>,
        anchor: Option<RecencyKey>,
        take: i64,
    ) -> ApiResult<Vec<VideoListItem>> {
        let mut sql = format!(
            "SELECT {VIDEO_LIST_COLUMNS} FROM videos v \
             JOIN users u ON u.id = v.user_id \
             WHERE v.visibility = 'public' AND v.id <> ?"
        );
        if category_id.is_some() {
            sql.push_str(" AND v.category_id = ?");
        }
        if anchor.is_some() {
            sql.push_str(RECENCY_ANCHOR);
        }
        sql.push_str(" ORDER BY v.updated_at DESC, v.id DESC LIMIT ?");

        let mut query = sqlx::query(&sql).bind(video_id);
        if let Some(category_id) = category_id {
            query = query.bind(category_id);
        }
        if let Some(key) = &anchor {
            query = query.bind(key.updated_at).bind(key.updated_at).bind(&key.id);
        }
        let rows = query.bind(take).fetch_all(&self.db).await?;
        rows.iter().map(list_item_from_row).collect()
    }
}
