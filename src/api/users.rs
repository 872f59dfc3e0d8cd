/// User and channel profile endpoints
use crate::{
    api::middleware,
    catalog::users::{User, UserProfile},
    context::AppContext,
    error::ApiResult,
};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};

/// Build user routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/users/me", get(get_me))
        .route("/api/users/:id", get(get_profile))
}

async fn get_me(State(ctx): State<AppContext>, headers: HeaderMap) -> ApiResult<Json<User>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    Ok(Json(viewer))
}

async fn get_profile(
    State(ctx): State<AppContext>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<UserProfile>> {
    let viewer = middleware::optional_viewer(State(ctx.clone()), headers).await?;
    let profile = ctx
        .users
        .get_profile(&user_id, viewer.as_ref().map(|v| v.id.as_str()))
        .await?;
    Ok(Json(profile))
}
