/// Comment threads: one level of top-level comments, one level of replies
///
/// Replies cannot nest further. Deleting a top-level comment cascades to its
/// replies through the schema's self-referential foreign key.
use crate::{
    catalog::users::Author,
    db,
    error::{ApiError, ApiResult},
    pagination::{self, RecencyKey},
    reactions::ReactionKind,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub user_id: String,
    pub video_id: String,
    pub parent_id: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    fn from_row(row: &SqliteRow) -> ApiResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            video_id: row.try_get("video_id")?,
            parent_id: row.try_get("parent_id")?,
            body: row.try_get("body")?,
            created_at: db::datetime_from_ms(row.try_get("created_at")?),
            updated_at: db::datetime_from_ms(row.try_get("updated_at")?),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentListItem {
    #[serde(flatten)]
    pub comment: Comment,
    pub user: Author,
    pub reply_count: i64,
    pub like_count: i64,
    pub dislike_count: i64,
    pub viewer_reaction: Option<ReactionKind>,
}

impl CommentListItem {
    fn from_row(row: &SqliteRow) -> ApiResult<Self> {
        let viewer_reaction = row
            .try_get::<Option<String>, _>("viewer_reaction")?
            .as_deref()
            .map(ReactionKind::from_str)
            .transpose()?;
        Ok(Self {
            comment: Comment::from_row(row)?,
            user: Author {
                id: row.try_get("author_id")?,
                name: row.try_get("author_name")?,
                image_url: row.try_get("author_image_url")?,
            },
            reply_count: row.try_get("reply_count")?,
            like_count: row.try_get("like_count")?,
            dislike_count: row.try_get("dislike_count")?,
            viewer_reaction,
        })
    }
}

/// A comment page also reports the video's top-level comment total, which is
/// what the UI prints in the section header. The total stays the same whether
/// the page lists top-level comments or one thread's replies.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPage {
    pub total_count: i64,
    pub items: Vec<CommentListItem>,
    pub next_cursor: Option<String>,
}

#[derive(Clone)]
pub struct CommentThreads {
    db: SqlitePool,
}

impl CommentThreads {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        author_id: &str,
        video_id: &str,
        parent_id: Option<&str>,
        body: &str,
    ) -> ApiResult<Comment> {
        let body = body.trim();
        if body.is_empty() {
            return Err(ApiError::Validation(
                "Comment body cannot be empty".to_string(),
            ));
        }

        let video: Option<String> = sqlx::query_scalar("SELECT id FROM videos WHERE id = ?")
            .bind(video_id)
            .fetch_optional(&self.db)
            .await?;
        if video.is_none() {
            return Err(ApiError::NotFound("Video not found".to_string()));
        }

        if let Some(parent_id) = parent_id {
            let parent = sqlx::query("SELECT video_id, parent_id FROM comments WHERE id = ?")
                .bind(parent_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| ApiError::NotFound("Parent comment not found".to_string()))?;
            if parent.try_get::<Option<String>, _>("parent_id")?.is_some() {
                return Err(ApiError::Validation(
                    "Replies cannot be nested".to_string(),
                ));
            }
            if parent.try_get::<String, _>("video_id")? != video_id {
                return Err(ApiError::Validation(
                    "Parent comment belongs to a different video".to_string(),
                ));
            }
        }

        let id = Uuid::new_v4().to_string();
        let now = db::now_ms();
        sqlx::query(
            "INSERT INTO comments (id, user_id, video_id, parent_id, body, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(author_id)
        .bind(video_id)
        .bind(parent_id)
        .bind(body)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;
        info!(comment_id = %id, video_id, reply = parent_id.is_some(), "comment posted");

        let row = sqlx::query("SELECT * FROM comments WHERE id = ?")
            .bind(&id)
            .fetch_one(&self.db)
            .await?;
        Comment::from_row(&row)
    }

    /// Authors can only delete their own comments. Replies go with their
    /// parent via the cascade.
    pub async fn remove(&self, author_id: &str, comment_id: &str) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ? AND user_id = ?")
            .bind(comment_id)
            .bind(author_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Comment not found".to_string()));
        }
        info!(comment_id, "comment removed by author");
        Ok(())
    }

    pub async fn exists(&self, comment_id: &str) -> ApiResult<bool> {
        let found: Option<String> = sqlx::query_scalar("SELECT id FROM comments WHERE id = ?")
            .bind(comment_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(found.is_some())
    }

    /// List a video's top-level comments, or one comment's replies when
    /// `parent_id` is set.
    pub async fn list(
        &self,
        video_id: &str,
        parent_id: Option<&str>,
        viewer_id: Option<&str>,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> ApiResult<CommentPage> {
        let total_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM comments WHERE video_id = ? AND parent_id IS NULL",
        )
        .bind(video_id)
        .fetch_one(&self.db)
        .await?;

        let page = pagination::fetch_page(
            cursor,
            limit,
            |anchor, take| self.fetch_rows(video_id, parent_id, viewer_id, anchor, take),
            |item: &CommentListItem| RecencyKey {
                updated_at: item.comment.updated_at.timestamp_millis(),
                id: item.comment.id.clone(),
            },
        )
        .await?;

        Ok(CommentPage {
            total_count,
            items: page.items,
            next_cursor: page.next_cursor,
        })
    }

    async fn fetch_rows(
        &self,
        video_id: &str,
        parent_id: Option<&str>,
        viewer_id: Option<&str>,
        anchor: Option<RecencyKey>,
        take: i64,
    ) -> ApiResult<Vec<CommentListItem>> {
        let mut sql = String::from(
            "SELECT c.id, c.user_id, c.video_id, c.parent_id, c.body, c.created_at, c.updated_at, \
             u.id AS author_id, u.name AS author_name, u.image_url AS author_image_url, \
             (SELECT COUNT(*) FROM comments r WHERE r.parent_id = c.id) AS reply_count, \
             (SELECT COUNT(*) FROM reactions r WHERE r.target_kind = 'comment' \
                 AND r.target_id = c.id AND r.kind = 'like') AS like_count, \
             (SELECT COUNT(*) FROM reactions r WHERE r.target_kind = 'comment' \
                 AND r.target_id = c.id AND r.kind = 'dislike') AS dislike_count, \
             (SELECT r.kind FROM reactions r WHERE r.actor_id = ? \
                 AND r.target_kind = 'comment' AND r.target_id = c.id) AS viewer_reaction \
             FROM comments c JOIN users u ON u.id = c.user_id \
             WHERE c.video_id = ?",
        );
        if parent_id.is_some() {
            sql.push_str(" AND c.parent_id = ?");
        } else {
            sql.push_str(" AND c.parent_id IS NULL");
        }
        if anchor.is_some() {
            sql.push_str(" AND (c.updated_at < ? OR (c.updated_at = ? AND c.id < ?))");
        }
        sql.push_str(" ORDER BY c.updated_at DESC, c.id DESC LIMIT ?");

        let mut query = sqlx::query(&sql).bind(viewer_id).bind(video_id);
        if let Some(parent_id) = parent_id {
            query = query.bind(parent_id);
        }
        if let Some(key) = &anchor {
            query = query.bind(key.updated_at).bind(key.updated_at).bind(&key.id);
        }
        let rows = query.bind(take).fetch_all(&self.db).await?;
        rows.iter().map(CommentListItem::from_row).collect()
    }
}
