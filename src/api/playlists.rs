/// Playlist endpoints, including the liked and history collections
use crate::{
    api::{middleware, PageQuery},
    catalog::playlists::{HistoryVideoItem, LikedVideoItem, Playlist, PlaylistListItem},
    catalog::videos::VideoListItem,
    context::AppContext,
    error::ApiResult,
    pagination::Page,
};
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

/// Build playlist routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/playlists", get(list_shelf).post(create_playlist))
        .route("/api/playlists/liked", get(list_liked))
        .route("/api/playlists/history", get(list_history))
        .route(
            "/api/playlists/:id",
            get(get_playlist).delete(remove_playlist),
        )
        .route("/api/playlists/:id/videos", get(list_videos))
        .route(
            "/api/playlists/:id/videos/:video_id",
            post(add_video).delete(remove_video),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePlaylistRequest {
    name: String,
    description: Option<String>,
}

async fn create_playlist(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(req): Json<CreatePlaylistRequest>,
) -> ApiResult<Json<Playlist>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    let playlist = ctx
        .playlists
        .create(&viewer.id, &req.name, req.description.as_deref())
        .await?;
    Ok(Json(playlist))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShelfQuery {
    /// When set, each entry reports whether it already holds this video
    video_id: Option<String>,
    cursor: Option<String>,
    limit: Option<i64>,
}

async fn list_shelf(
    State(ctx): State<AppContext>,
    Query(query): Query<ShelfQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<Page<PlaylistListItem>>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    let page = match query.video_id.as_deref() {
        Some(video_id) => {
            ctx.playlists
                .list_for_video(&viewer.id, video_id, query.cursor.as_deref(), query.limit)
                .await?
        }
        None => {
            ctx.playlists
                .list(&viewer.id, query.cursor.as_deref(), query.limit)
                .await?
        }
    };
    Ok(Json(page))
}

async fn get_playlist(
    State(ctx): State<AppContext>,
    Path(playlist_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<Playlist>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    let playlist = ctx.playlists.get_one(&viewer.id, &playlist_id).await?;
    Ok(Json(playlist))
}

async fn remove_playlist(
    State(ctx): State<AppContext>,
    Path(playlist_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    ctx.playlists.remove(&viewer.id, &playlist_id).await?;
    Ok(Json(json!({ "deleted": true })))
}

async fn list_videos(
    State(ctx): State<AppContext>,
    Path(playlist_id): Path<String>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<Page<VideoListItem>>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    let page = ctx
        .playlists
        .list_videos(&viewer.id, &playlist_id, query.cursor.as_deref(), query.limit)
        .await?;
    Ok(Json(page))
}

async fn add_video(
    State(ctx): State<AppContext>,
    Path((playlist_id, video_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    ctx.playlists
        .add_video(&viewer.id, &playlist_id, &video_id)
        .await?;
    Ok(Json(json!({ "added": true })))
}

async fn remove_video(
    State(ctx): State<AppContext>,
    Path((playlist_id, video_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    ctx.playlists
        .remove_video(&viewer.id, &playlist_id, &video_id)
        .await?;
    Ok(Json(json!({ "removed": true })))
}

async fn list_liked(
    State(ctx): State<AppContext>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<Page<LikedVideoItem>>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    let page = ctx
        .playlists
        .list_liked(&viewer.id, query.cursor.as_deref(), query.limit)
        .await?;
    Ok(Json(page))
}

async fn list_history(
    State(ctx): State<AppContext>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<Page<HistoryVideoItem>>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    let page = ctx
        .playlists
        .list_history(&viewer.id, query.cursor.as_deref(), query.limit)
        .await?;
    Ok(Json(page))
}
