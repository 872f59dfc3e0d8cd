/// Transcoder callback intake
///
/// The transcoding pipeline reports progress by POSTing signed events
/// here. Signature verification and state transitions live in
/// [`crate::media`]; this handler only unwraps the HTTP envelope.
use crate::{context::AppContext, error::ApiResult};
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde_json::json;

pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/webhooks/media", post(receive_media_event))
}

async fn receive_media_event(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<serde_json::Value>> {
    let signature = headers
        .get("x-webhook-signature")
        .and_then(|value| value.to_str().ok());
    let outcome = ctx.media.handle(&body, signature).await?;
    Ok(Json(json!({ "received": true, "outcome": outcome.as_str() })))
}
