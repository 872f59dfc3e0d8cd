/// Probe endpoints for orchestrated deployments
///
/// `/health/live` answers whenever the process can still schedule a task;
/// `/health/ready` answers 503 while the database is unreachable so the
/// load balancer drains us instead of surfacing errors; `/health/detailed`
/// reports per-dependency conditions for dashboards.
use crate::{context::AppContext, error::ApiResult, jobs, metrics};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;
use std::time::Instant;

/// Condition of a dependency, ordered so the worst one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentReport {
    pub component: String,
    pub condition: Condition,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub condition: Condition,
    pub version: &'static str,
    pub uptime_seconds: i64,
    pub components: Vec<ComponentReport>,
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health))
        .route("/health/live", get(live))
        .route("/health/ready", get(ready))
        .route("/health/detailed", get(detailed))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Reaching this handler at all is the liveness proof.
async fn live() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn ready(State(ctx): State<AppContext>) -> Result<Json<serde_json::Value>, StatusCode> {
    if let Err(e) = ping_database(&ctx).await {
        tracing::warn!(error = %e, "readiness check failed");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(serde_json::json!({
        "status": "ready",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

async fn detailed(State(ctx): State<AppContext>) -> (StatusCode, Json<HealthReport>) {
    let components = vec![database_report(&ctx).await, jobs_report(&ctx).await];
    let condition = worst_of(&components);

    let report = HealthReport {
        condition,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: uptime_seconds(),
        components,
    };

    let code = match condition {
        Condition::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        // degraded still serves traffic
        _ => StatusCode::OK,
    };

    (code, Json(report))
}

async fn ping_database(ctx: &AppContext) -> ApiResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;
    Ok(())
}

async fn database_report(ctx: &AppContext) -> ComponentReport {
    let start = Instant::now();
    let outcome = ping_database(ctx).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(()) => ComponentReport {
            component: "database".to_string(),
            condition: Condition::Healthy,
            latency_ms,
            error: None,
            details: Some(serde_json::json!({
                "type": "sqlite",
                "poolSize": ctx.db.size() as u32,
            })),
        },
        Err(e) => ComponentReport {
            component: "database".to_string(),
            condition: Condition::Unhealthy,
            latency_ms,
            error: Some(e.to_string()),
            details: None,
        },
    }
}

/// Failing janitors degrade the service but do not take it down.
async fn jobs_report(ctx: &AppContext) -> ComponentReport {
    let start = Instant::now();
    let outcome = jobs::tasks::health_check(ctx).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(()) => ComponentReport {
            component: "background_jobs".to_string(),
            condition: Condition::Healthy,
            latency_ms,
            error: None,
            details: Some(serde_json::json!({ "scheduler": "running" })),
        },
        Err(e) => ComponentReport {
            component: "background_jobs".to_string(),
            condition: Condition::Degraded,
            latency_ms,
            error: Some(e.to_string()),
            details: None,
        },
    }
}

fn worst_of(components: &[ComponentReport]) -> Condition {
    components
        .iter()
        .map(|c| c.condition)
        .max()
        .unwrap_or(Condition::Healthy)
}

fn uptime_seconds() -> i64 {
    let started = metrics::SERVICE_START_TIME.get();
    if started > 0 {
        chrono::Utc::now().timestamp() - started
    } else {
        0
    }
}
