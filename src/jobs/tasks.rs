/// Background task implementations
use crate::{context::AppContext, error::ApiResult};

/// Grace period before an unclaimed draft counts as abandoned
const STALE_UPLOAD_GRACE_MS: i64 = 24 * 60 * 60 * 1000;

/// Sweep reaction rows whose target video or comment no longer exists
pub async fn sweep_orphaned_reactions(ctx: &AppContext) -> ApiResult<u64> {
    ctx.reactions.sweep_orphaned().await
}

/// Purge drafts the transcoding pipeline never claimed
pub async fn purge_stale_uploads(ctx: &AppContext) -> ApiResult<u64> {
    ctx.videos.purge_stale_uploads(STALE_UPLOAD_GRACE_MS).await
}

/// Confirm the database still answers queries
pub async fn health_check(ctx: &AppContext) -> ApiResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;
    Ok(())
}
