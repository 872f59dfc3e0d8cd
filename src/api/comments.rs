/// Comment endpoints: posting, listing threads, and comment reactions
use crate::{
    api::middleware,
    catalog::comments::{Comment, CommentPage},
    context::AppContext,
    error::{ApiError, ApiResult},
    reactions::{ReactionKind, ReactionRow, TargetKind},
};
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

/// Build comment routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route(
            "/api/videos/:id/comments",
            get(list_comments).post(create_comment),
        )
        .route("/api/comments/:id", delete(remove_comment))
        .route("/api/comments/:id/reactions", post(toggle_reaction))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentListQuery {
    /// List one comment's replies instead of the video's top level
    parent_id: Option<String>,
    cursor: Option<String>,
    limit: Option<i64>,
}

async fn list_comments(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
    Query(query): Query<CommentListQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<CommentPage>> {
    let viewer = middleware::optional_viewer(State(ctx.clone()), headers).await?;
    let page = ctx
        .comments
        .list(
            &video_id,
            query.parent_id.as_deref(),
            viewer.as_ref().map(|u| u.id.as_str()),
            query.cursor.as_deref(),
            query.limit,
        )
        .await?;
    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCommentRequest {
    body: String,
    parent_id: Option<String>,
}

async fn create_comment(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<CreateCommentRequest>,
) -> ApiResult<Json<Comment>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    let comment = ctx
        .comments
        .create(&viewer.id, &video_id, req.parent_id.as_deref(), &req.body)
        .await?;
    Ok(Json(comment))
}

async fn remove_comment(
    State(ctx): State<AppContext>,
    Path(comment_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    ctx.comments.remove(&viewer.id, &comment_id).await?;
    Ok(Json(json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
struct ToggleReactionRequest {
    kind: String,
}

async fn toggle_reaction(
    State(ctx): State<AppContext>,
    Path(comment_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<ToggleReactionRequest>,
) -> ApiResult<Json<Option<ReactionRow>>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    let kind = ReactionKind::from_str(&req.kind)?;
    if !ctx.comments.exists(&comment_id).await? {
        return Err(ApiError::NotFound("Comment not found".to_string()));
    }
    let row = ctx
        .reactions
        .toggle(&viewer.id, TargetKind::Comment, &comment_id, kind)
        .await?;
    Ok(Json(row))
}
