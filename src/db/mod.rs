/// Database layer for Driftcast
///
/// Manages the SQLite connection pool, migrations, and the timestamp
/// conventions shared by every manager (integer Unix milliseconds in
/// storage, `DateTime<Utc>` in models).
use crate::error::{ApiError, ApiResult};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use std::path::Path;

/// Pool tuning knobs
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub enable_wal: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            enable_wal: true,
        }
    }
}

/// Open the SQLite pool
pub async fn create_pool(path: &Path, options: DatabaseOptions) -> ApiResult<SqlitePool> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .connect_with(
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(if options.enable_wal {
                    sqlx::sqlite::SqliteJournalMode::Wal
                } else {
                    sqlx::sqlite::SqliteJournalMode::Delete
                })
                .foreign_keys(true)
                .busy_timeout(std::time::Duration::from_secs(5)),
        )
        .await
        .map_err(ApiError::Database)?;

    Ok(pool)
}

/// Apply pending migrations; the files are compiled into the binary
pub async fn run_migrations(pool: &SqlitePool) -> ApiResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| ApiError::Internal(format!("Migration failed: {}", e)))?;

    Ok(())
}

/// One-row probe for readiness checks
pub async fn test_connection(pool: &SqlitePool) -> ApiResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(ApiError::Database)?;

    Ok(())
}

/// Whether an error is a unique-constraint violation, for callers that
/// map duplicates to a 409 instead of a 500.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Current wall clock as Unix milliseconds, the storage representation
/// for every timestamp column.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Storage milliseconds back to a model timestamp. Values we wrote are
/// always in range; anything else collapses to the epoch.
pub fn datetime_from_ms(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_pool_applies_migrations_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("driftcast.sqlite");

        let pool = create_pool(&path, DatabaseOptions::default()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        test_connection(&pool).await.unwrap();

        // Seeded categories are present
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(count > 0);
    }

    #[test]
    fn millisecond_round_trip_is_exact() {
        let now = Utc::now();
        let ms = now.timestamp_millis();
        assert_eq!(datetime_from_ms(ms).timestamp_millis(), ms);
    }
}
