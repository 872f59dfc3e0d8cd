/// Polymorphic like/dislike ledger shared by videos and comments
///
/// One row per (actor, target). Toggling the kind already present removes
/// the row, toggling the other kind overwrites it in place. Both arms run
/// inside one transaction so concurrent toggles converge on a single row.
use crate::{
    db,
    error::{ApiError, ApiResult},
    metrics,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        }
    }

    pub fn from_str(s: &str) -> ApiResult<Self> {
        match s {
            "like" => Ok(ReactionKind::Like),
            "dislike" => Ok(ReactionKind::Dislike),
            _ => Err(ApiError::Validation(format!("Unknown reaction kind: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Video,
    Comment,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Video => "video",
            TargetKind::Comment => "comment",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRow {
    pub actor_id: String,
    pub target_kind: TargetKind,
    pub target_id: String,
    pub kind: ReactionKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReactionRow {
    fn from_row(row: &SqliteRow) -> ApiResult<Self> {
        let target_kind = match row.try_get::<String, _>("target_kind")?.as_str() {
            "comment" => TargetKind::Comment,
            _ => TargetKind::Video,
        };
        Ok(Self {
            actor_id: row.try_get("actor_id")?,
            target_kind,
            target_id: row.try_get("target_id")?,
            kind: ReactionKind::from_str(&row.try_get::<String, _>("kind")?)?,
            created_at: db::datetime_from_ms(row.try_get("created_at")?),
            updated_at: db::datetime_from_ms(row.try_get("updated_at")?),
        })
    }
}

#[derive(Clone)]
pub struct ReactionLedger {
    db: SqlitePool,
}

impl ReactionLedger {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Toggle a reaction. Returns the row now in force, or None when the
    /// toggle removed it.
    pub async fn toggle(
        &self,
        actor_id: &str,
        target_kind: TargetKind,
        target_id: &str,
        kind: ReactionKind,
    ) -> ApiResult<Option<ReactionRow>> {
        let mut tx = self.db.begin().await?;

        // same kind present: the toggle is a removal
        let removed = sqlx::query(
            "DELETE FROM reactions \
             WHERE actor_id = ? AND target_kind = ? AND target_id = ? AND kind = ? \
             RETURNING actor_id",
        )
        .bind(actor_id)
        .bind(target_kind.as_str())
        .bind(target_id)
        .bind(kind.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if removed.is_some() {
            tx.commit().await?;
            metrics::record_reaction_toggle(target_kind.as_str(), "removed");
            debug!(actor_id, target_id, kind = kind.as_str(), "reaction removed");
            return Ok(None);
        }

        // absent or the opposite kind: insert, or overwrite the kind in place
        let now = db::now_ms();
        let row = sqlx::query(
            "INSERT INTO reactions (actor_id, target_kind, target_id, kind, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT (actor_id, target_kind, target_id) \
             DO UPDATE SET kind = excluded.kind, updated_at = excluded.updated_at \
             RETURNING actor_id, target_kind, target_id, kind, created_at, updated_at",
        )
        .bind(actor_id)
        .bind(target_kind.as_str())
        .bind(target_id)
        .bind(kind.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        metrics::record_reaction_toggle(target_kind.as_str(), "set");
        debug!(actor_id, target_id, kind = kind.as_str(), "reaction set");
        ReactionRow::from_row(&row).map(Some)
    }

    /// The actor's current reaction on a target, if any.
    pub async fn find(
        &self,
        actor_id: &str,
        target_kind: TargetKind,
        target_id: &str,
    ) -> ApiResult<Option<ReactionKind>> {
        let kind = sqlx::query_scalar::<_, String>(
            "SELECT kind FROM reactions \
             WHERE actor_id = ? AND target_kind = ? AND target_id = ?",
        )
        .bind(actor_id)
        .bind(target_kind.as_str())
        .bind(target_id)
        .fetch_optional(&self.db)
        .await?;
        kind.as_deref().map(ReactionKind::from_str).transpose()
    }

    /// Delete rows whose target row is gone. The polymorphic key carries no
    /// declarative foreign key, so a periodic sweep keeps the ledger
    /// consistent with the entity tables.
    pub async fn sweep_orphaned(&self) -> ApiResult<u64> {
        let result = sqlx::query(
            "DELETE FROM reactions \
             WHERE (target_kind = 'video' \
                    AND NOT EXISTS (SELECT 1 FROM videos v WHERE v.id = reactions.target_id)) \
                OR (target_kind = 'comment' \
                    AND NOT EXISTS (SELECT 1 FROM comments c WHERE c.id = reactions.target_id))",
        )
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_ledger() -> (SqlitePool, ReactionLedger) {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        for id in ["u-1", "u-2"] {
            sqlx::query(
                "INSERT INTO users (id, subject, name, created_at, updated_at) \
                 VALUES (?, ?, 'Someone', 0, 0)",
            )
            .bind(id)
            .bind(format!("subject-{id}"))
            .execute(&pool)
            .await
            .unwrap();
        }
        (pool.clone(), ReactionLedger::new(pool))
    }

    async fn row_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM reactions")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn like_twice_returns_to_no_reaction() {
        let (pool, ledger) = test_ledger().await;

        let first = ledger
            .toggle("u-1", TargetKind::Video, "v-1", ReactionKind::Like)
            .await
            .unwrap();
        assert_eq!(first.unwrap().kind, ReactionKind::Like);

        let second = ledger
            .toggle("u-1", TargetKind::Video, "v-1", ReactionKind::Like)
            .await
            .unwrap();
        assert!(second.is_none());
        assert_eq!(row_count(&pool).await, 0);
        assert!(ledger
            .find("u-1", TargetKind::Video, "v-1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn like_then_dislike_overwrites_in_place() {
        let (pool, ledger) = test_ledger().await;

        ledger
            .toggle("u-1", TargetKind::Video, "v-1", ReactionKind::Like)
            .await
            .unwrap();
        let switched = ledger
            .toggle("u-1", TargetKind::Video, "v-1", ReactionKind::Dislike)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(switched.kind, ReactionKind::Dislike);
        assert_eq!(row_count(&pool).await, 1);
        assert_eq!(
            ledger.find("u-1", TargetKind::Video, "v-1").await.unwrap(),
            Some(ReactionKind::Dislike)
        );
    }

    #[tokio::test]
    async fn odd_number_of_identical_toggles_leaves_the_reaction() {
        let (_pool, ledger) = test_ledger().await;

        for _ in 0..3 {
            ledger
                .toggle("u-1", TargetKind::Comment, "c-1", ReactionKind::Like)
                .await
                .unwrap();
        }
        assert_eq!(
            ledger.find("u-1", TargetKind::Comment, "c-1").await.unwrap(),
            Some(ReactionKind::Like)
        );
    }

    #[tokio::test]
    async fn switch_preserves_created_at_and_bumps_updated_at() {
        let (_pool, ledger) = test_ledger().await;

        let liked = ledger
            .toggle("u-1", TargetKind::Video, "v-1", ReactionKind::Like)
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let switched = ledger
            .toggle("u-1", TargetKind::Video, "v-1", ReactionKind::Dislike)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(switched.created_at, liked.created_at);
        assert!(switched.updated_at > liked.updated_at);
    }

    #[tokio::test]
    async fn targets_with_the_same_id_but_different_kinds_are_independent() {
        let (pool, ledger) = test_ledger().await;

        ledger
            .toggle("u-1", TargetKind::Video, "shared-id", ReactionKind::Like)
            .await
            .unwrap();
        ledger
            .toggle("u-1", TargetKind::Comment, "shared-id", ReactionKind::Dislike)
            .await
            .unwrap();

        assert_eq!(row_count(&pool).await, 2);
        assert_eq!(
            ledger
                .find("u-1", TargetKind::Video, "shared-id")
                .await
                .unwrap(),
            Some(ReactionKind::Like)
        );
        assert_eq!(
            ledger
                .find("u-1", TargetKind::Comment, "shared-id")
                .await
                .unwrap(),
            Some(ReactionKind::Dislike)
        );
    }

    #[tokio::test]
    async fn sweep_removes_only_reactions_without_a_target_row() {
        let (pool, ledger) = test_ledger().await;
        sqlx::query(
            "INSERT INTO videos (id, user_id, title, created_at, updated_at) \
             VALUES ('v-real', 'u-1', 'Kept', 0, 0)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO comments (id, user_id, video_id, body, created_at, updated_at) \
             VALUES ('c-real', 'u-1', 'v-real', 'hi', 0, 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        for (kind, id) in [
            (TargetKind::Video, "v-real"),
            (TargetKind::Video, "v-gone"),
            (TargetKind::Comment, "c-real"),
            (TargetKind::Comment, "c-gone"),
        ] {
            ledger.toggle("u-1", kind, id, ReactionKind::Like).await.unwrap();
        }

        let swept = ledger.sweep_orphaned().await.unwrap();

        assert_eq!(swept, 2);
        assert_eq!(row_count(&pool).await, 2);
        assert!(ledger
            .find("u-1", TargetKind::Video, "v-real")
            .await
            .unwrap()
            .is_some());
        assert!(ledger
            .find("u-1", TargetKind::Video, "v-gone")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn actors_do_not_interfere() {
        let (pool, ledger) = test_ledger().await;

        ledger
            .toggle("u-1", TargetKind::Video, "v-1", ReactionKind::Like)
            .await
            .unwrap();
        ledger
            .toggle("u-2", TargetKind::Video, "v-1", ReactionKind::Like)
            .await
            .unwrap();
        // u-2 un-likes; u-1's reaction must survive
        ledger
            .toggle("u-2", TargetKind::Video, "v-1", ReactionKind::Like)
            .await
            .unwrap();

        assert_eq!(row_count(&pool).await, 1);
        assert_eq!(
            ledger.find("u-1", TargetKind::Video, "v-1").await.unwrap(),
            Some(ReactionKind::Like)
        );
    }
}
