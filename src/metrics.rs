/// Metrics and telemetry for Linkshelf
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - HTTP request counts and latencies
/// - Public tracking outcomes
/// - Platform API calls and token refreshes
/// - Background job execution

use lazy_static::lazy_static;
use prometheus::{
    register_gauge, register_histogram_vec, register_int_counter_vec, register_int_gauge,
    Encoder, Gauge, HistogramVec, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    /// Active HTTP requests
    pub static ref HTTP_REQUESTS_ACTIVE: IntGauge = register_int_gauge!(
        "http_requests_active",
        "Number of HTTP requests currently being processed"
    )
    .unwrap();

    // ========== Tracking Metrics ==========

    /// Public tracking attempts by kind (profile_view, link_click, banner_click) and outcome
    pub static ref TRACKING_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "tracking_events_total",
        "Total number of public tracking attempts",
        &["kind", "outcome"]
    )
    .unwrap();

    // ========== Platform Metrics ==========

    /// Calls made against social platform APIs
    pub static ref CONNECTOR_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "connector_requests_total",
        "Total number of social platform API requests",
        &["platform", "status"]
    )
    .unwrap();

    /// Access token refresh attempts
    pub static ref TOKEN_REFRESHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "token_refreshes_total",
        "Total number of OAuth token refresh attempts",
        &["platform", "result"]
    )
    .unwrap();

    // ========== Background Job Metrics ==========

    /// Background job executions
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "background_jobs_total",
        "Total number of background jobs executed",
        &["job_type", "status"]
    )
    .unwrap();

    /// Background job duration
    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "background_job_duration_seconds",
        "Background job execution time in seconds",
        &["job_type"],
        vec![0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
    )
    .unwrap();

    // ========== System Metrics ==========

    /// Application uptime in seconds
    pub static ref UPTIME_SECONDS: Gauge = register_gauge!(
        "uptime_seconds",
        "Application uptime in seconds"
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record a tracking attempt
pub fn record_tracking_event(kind: &str, outcome: &str) {
    TRACKING_EVENTS_TOTAL
        .with_label_values(&[kind, outcome])
        .inc();
}

/// Record a platform API response
pub fn record_connector_request(platform: &str, status: u16) {
    CONNECTOR_REQUESTS_TOTAL
        .with_label_values(&[platform, &status.to_string()])
        .inc();
}

/// Record a token refresh
pub fn record_token_refresh(platform: &str, success: bool) {
    TOKEN_REFRESHES_TOTAL
        .with_label_values(&[platform, if success { "success" } else { "failure" }])
        .inc();
}

/// Record a background job execution
pub fn record_background_job(job_type: &str, status: &str, duration: f64) {
    BACKGROUND_JOBS_TOTAL
        .with_label_values(&[job_type, status])
        .inc();
    BACKGROUND_JOB_DURATION_SECONDS
        .with_label_values(&[job_type])
        .observe(duration);
}
