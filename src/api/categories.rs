/// Category listing
use crate::{catalog::categories::Category, context::AppContext, error::ApiResult};
use axum::{extract::State, routing::get, Json, Router};

pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/categories", get(list_categories))
}

async fn list_categories(State(ctx): State<AppContext>) -> ApiResult<Json<Vec<Category>>> {
    let categories = ctx.categories.list_all().await?;
    Ok(Json(categories))
}
