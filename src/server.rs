/// HTTP server setup and routing
use crate::{
    api::middleware::track_metrics,
    context::AppContext,
    error::{ApiError, ApiResult},
    rate_limit::rate_limit_middleware,
};
use axum::{
    http::{header, HeaderName, Method, StatusCode},
    middleware,
    response::Json,
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Assemble the application router. State is baked in, so the result is a
/// plain `Router` ready for `axum::serve`.
pub fn build_router(ctx: AppContext) -> Router {
    // The identity headers are forwarded by the gateway, so browsers never
    // send them cross-origin themselves, but tooling does.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-identity-name"),
            HeaderName::from_static("x-identity-image"),
        ]);

    Router::new()
        // Prometheus scrape endpoint
        .route("/metrics", get(metrics_endpoint))
        // route modules carry AppContext state; merge them before it is applied
        .merge(crate::api::routes())
        .with_state(ctx.clone())
        // Layers nest outward: trace wraps everything, the limiter and the
        // metrics recorder sit closest to the handlers.
        .layer(middleware::from_fn_with_state(ctx, rate_limit_middleware))
        .layer(middleware::from_fn(track_metrics))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .fallback(not_found)
}

/// Prometheus text exposition handler
async fn metrics_endpoint() -> ApiResult<String> {
    crate::metrics::render_metrics()
        .map_err(|e| ApiError::Internal(format!("Failed to render metrics: {}", e)))
}

/// Fallback for unrouted paths
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NotFound",
            "message": "Endpoint not found"
        })),
    )
}

/// Bind the listener and run until the process is stopped
pub async fn serve(ctx: AppContext) -> ApiResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("🚀 Driftcast listening on {}", addr);
    info!("   Service URL: {}", ctx.service_url());

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| ApiError::Internal(format!("HTTP server terminated: {}", e)))?;

    Ok(())
}
