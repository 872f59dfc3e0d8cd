/// Video endpoints: drafts and owner edits, the public feeds, views,
/// and the like/dislike toggle
use crate::{
    api::{middleware, PageQuery},
    catalog::videos::{Video, VideoDetail, VideoListItem, VideoUpdate},
    catalog::views::VideoView,
    context::AppContext,
    error::{ApiError, ApiResult},
    pagination::Page,
    reactions::{ReactionKind, ReactionRow, TargetKind},
};
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

/// Build video routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/videos", get(list_public).post(create_draft))
        .route("/api/videos/trending", get(list_trending))
        .route("/api/videos/subscribed", get(list_subscribed))
        .route("/api/videos/search", get(search))
        .route(
            "/api/videos/:id",
            get(get_video).patch(update_video).delete(delete_video),
        )
        .route("/api/videos/:id/suggestions", get(list_suggestions))
        .route("/api/videos/:id/views", post(record_view))
        .route("/api/videos/:id/reactions", post(toggle_reaction))
        .route("/api/videos/:id/restore-thumbnail", post(restore_thumbnail))
        .route("/api/studio/videos", get(list_studio))
        .route("/api/studio/videos/:id", get(get_studio_video))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateVideoRequest {
    /// Correlation key handed out by the upload flow
    upload_ref: String,
    title: Option<String>,
}

async fn create_draft(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(req): Json<CreateVideoRequest>,
) -> ApiResult<Json<Video>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    let video = ctx
        .videos
        .create(&viewer.id, &req.upload_ref, req.title.as_deref())
        .await?;
    Ok(Json(video))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedQuery {
    user_id: Option<String>,
    category_id: Option<String>,
    cursor: Option<String>,
    limit: Option<i64>,
}

async fn list_public(
    State(ctx): State<AppContext>,
    Query(query): Query<FeedQuery>,
) -> ApiResult<Json<Page<VideoListItem>>> {
    let page = ctx
        .videos
        .list_public(
            query.user_id.as_deref(),
            query.category_id.as_deref(),
            query.cursor.as_deref(),
            query.limit,
        )
        .await?;
    Ok(Json(page))
}

async fn list_trending(
    State(ctx): State<AppContext>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<VideoListItem>>> {
    let page = ctx
        .videos
        .list_trending(query.cursor.as_deref(), query.limit)
        .await?;
    Ok(Json(page))
}

async fn list_subscribed(
    State(ctx): State<AppContext>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<Page<VideoListItem>>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    let page = ctx
        .videos
        .list_subscribed(&viewer.id, query.cursor.as_deref(), query.limit)
        .await?;
    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchQuery {
    query: Option<String>,
    category_id: Option<String>,
    cursor: Option<String>,
    limit: Option<i64>,
}

async fn search(
    State(ctx): State<AppContext>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Page<VideoListItem>>> {
    let page = ctx
        .videos
        .search(
            query.query.as_deref(),
            query.category_id.as_deref(),
            query.cursor.as_deref(),
            query.limit,
        )
        .await?;
    Ok(Json(page))
}

async fn get_video(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<VideoDetail>> {
    let viewer = middleware::optional_viewer(State(ctx.clone()), headers).await?;
    let detail = ctx
        .videos
        .get_one(&video_id, viewer.as_ref().map(|u| u.id.as_str()))
        .await?;
    Ok(Json(detail))
}

async fn update_video(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    Json(changes): Json<VideoUpdate>,
) -> ApiResult<Json<Video>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    let video = ctx.videos.update(&viewer.id, &video_id, changes).await?;
    Ok(Json(video))
}

async fn delete_video(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    ctx.videos.remove(&viewer.id, &video_id).await?;
    Ok(Json(json!({ "deleted": true })))
}

async fn restore_thumbnail(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<Video>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    let video = ctx.videos.restore_thumbnail(&viewer.id, &video_id).await?;
    Ok(Json(video))
}

async fn list_suggestions(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<VideoListItem>>> {
    let page = ctx
        .videos
        .list_suggested(&video_id, query.cursor.as_deref(), query.limit)
        .await?;
    Ok(Json(page))
}

async fn record_view(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<VideoView>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    let view = ctx.views.record(&viewer.id, &video_id).await?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
struct ToggleReactionRequest {
    kind: String,
}

/// Toggle the caller's reaction on a video. Unlike lifecycle callbacks,
/// a vanished target is a hard 404 here, not a no-op.
async fn toggle_reaction(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<ToggleReactionRequest>,
) -> ApiResult<Json<Option<ReactionRow>>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    let kind = ReactionKind::from_str(&req.kind)?;
    if !ctx.videos.exists(&video_id).await? {
        return Err(ApiError::NotFound("Video not found".to_string()));
    }
    let row = ctx
        .reactions
        .toggle(&viewer.id, TargetKind::Video, &video_id, kind)
        .await?;
    Ok(Json(row))
}

async fn list_studio(
    State(ctx): State<AppContext>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<Page<Video>>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    let page = ctx
        .videos
        .list_owner(&viewer.id, query.cursor.as_deref(), query.limit)
        .await?;
    Ok(Json(page))
}

async fn get_studio_video(
    State(ctx): State<AppContext>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<Video>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    let video = ctx.videos.get_owner(&viewer.id, &video_id).await?;
    Ok(Json(video))
}
