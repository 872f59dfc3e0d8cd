/// Identity resolution for gateway-fronted requests
///
/// The platform sits behind an authenticating gateway. By the time a request
/// arrives here its credentials are already verified; the bearer value is the
/// caller's stable subject, and the optional `x-identity-name` /
/// `x-identity-image` headers carry refreshed profile fields.
use crate::{
    catalog::users::User,
    context::AppContext,
    error::{ApiError, ApiResult},
    metrics,
};
use axum::{
    extract::{MatchedPath, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Extract the verified subject from the Authorization header
pub fn extract_subject(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn profile_header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Require an identified caller, provisioning the account on first sight.
pub async fn require_viewer(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> ApiResult<User> {
    let subject = extract_subject(&headers)
        .ok_or_else(|| ApiError::Authentication("Missing authorization header".to_string()))?;

    let name = profile_header(&headers, "x-identity-name");
    let image_url = profile_header(&headers, "x-identity-image");
    ctx.users
        .provision(&subject, name.as_deref(), image_url.as_deref())
        .await
}

/// Resolve the caller when identified; anonymous requests resolve to None.
pub async fn optional_viewer(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> ApiResult<Option<User>> {
    if extract_subject(&headers).is_none() {
        return Ok(None);
    }
    require_viewer(State(ctx), headers).await.map(Some)
}

/// Record method, matched route, and status for every request.
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    // label by route template, not the raw path, to keep cardinality bounded
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = next.run(req).await;

    metrics::record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}
