/// API routes and handlers
pub mod categories;
pub mod comments;
pub mod health;
pub mod middleware;
pub mod playlists;
pub mod subscriptions;
pub mod users;
pub mod videos;
pub mod webhooks;

use crate::context::AppContext;
use axum::Router;
use serde::Deserialize;

/// Cursor/limit pair shared by every paginated listing
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(videos::routes())
        .merge(comments::routes())
        .merge(playlists::routes())
        .merge(subscriptions::routes())
        .merge(users::routes())
        .merge(categories::routes())
        .merge(webhooks::routes())
}
