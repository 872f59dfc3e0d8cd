/// Prometheus metrics registry
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "driftcast_http_requests_total",
        "Total number of HTTP requests handled",
        &["method", "path", "status"]
    )
    .unwrap();
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "driftcast_http_request_duration_seconds",
        "HTTP request latency in seconds",
        &["method", "path"]
    )
    .unwrap();
    pub static ref LIFECYCLE_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "driftcast_lifecycle_events_total",
        "Transcoder lifecycle events received, by type and outcome",
        &["event_type", "outcome"]
    )
    .unwrap();
    pub static ref REACTION_TOGGLES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "driftcast_reaction_toggles_total",
        "Reaction toggles applied, by target kind and result",
        &["target_kind", "result"]
    )
    .unwrap();
    pub static ref SERVICE_START_TIME: IntGauge = register_int_gauge!(
        "driftcast_service_start_time_seconds",
        "Unix timestamp at which the service started"
    )
    .unwrap();
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

pub fn record_lifecycle_event(event_type: &str, outcome: &str) {
    LIFECYCLE_EVENTS_TOTAL
        .with_label_values(&[event_type, outcome])
        .inc();
}

pub fn record_reaction_toggle(target_kind: &str, result: &str) {
    REACTION_TOGGLES_TOTAL
        .with_label_values(&[target_kind, result])
        .inc();
}

/// Render every registered metric in the Prometheus text format.
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).to_string())
}
