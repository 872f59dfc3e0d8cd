/// Subscription endpoints
use crate::{
    api::{middleware, PageQuery},
    catalog::subscriptions::{Subscription, SubscriptionItem},
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
use serde_json::json;

/// Build subscription routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/subscriptions", get(list_subscriptions))
        .route(
            "/api/subscriptions/:creator_id",
            post(subscribe).delete(unsubscribe),
        )
}

async fn list_subscriptions(
    State(ctx): State<AppContext>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<Page<SubscriptionItem>>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    let page = ctx
        .subscriptions
        .list(&viewer.id, query.cursor.as_deref(), query.limit)
        .await?;
    Ok(Json(page))
}

async fn subscribe(
    State(ctx): State<AppContext>,
    Path(creator_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<Subscription>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    let subscription = ctx.subscriptions.subscribe(&viewer.id, &creator_id).await?;
    Ok(Json(subscription))
}

async fn unsubscribe(
    State(ctx): State<AppContext>,
    Path(creator_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let viewer = middleware::require_viewer(State(ctx.clone()), headers).await?;
    ctx.subscriptions
        .unsubscribe(&viewer.id, &creator_id)
        .await?;
    Ok(Json(json!({ "deleted": true })))
}
