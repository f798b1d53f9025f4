/// Metrics and telemetry for the marketplace
///
/// Every series carries the `x67_` prefix and is served in text format at
/// `/metrics`. Ad, payment and notification counters are bumped by the
/// managers themselves, so handlers never double count.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "x67_http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "x67_http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    /// Active HTTP requests
    pub static ref HTTP_REQUESTS_ACTIVE: IntGauge = register_int_gauge!(
        "x67_http_requests_active",
        "Number of HTTP requests currently being processed"
    )
    .unwrap();

    // ========== Ad Metrics ==========

    /// Ads created
    pub static ref ADS_CREATED_TOTAL: IntCounter = register_int_counter!(
        "x67_ads_created_total",
        "Total number of ads created"
    )
    .unwrap();

    /// Ad detail views
    pub static ref AD_VIEWS_TOTAL: IntCounter = register_int_counter!(
        "x67_ad_views_total",
        "Total number of ad detail views"
    )
    .unwrap();

    /// Top-up attempts by result
    pub static ref TOPUPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "x67_topups_total",
        "Total number of top-up attempts",
        &["result"]
    )
    .unwrap();

    /// Moderation status changes by target status
    pub static ref MODERATION_ACTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "x67_moderation_actions_total",
        "Total number of ad status changes made by admins",
        &["status"]
    )
    .unwrap();

    // ========== Payment Metrics ==========

    /// Webhook deliveries by outcome
    pub static ref WEBHOOKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "x67_payment_webhooks_total",
        "Total number of payment webhook deliveries",
        &["outcome"]
    )
    .unwrap();

    /// Completed payments by payment type
    pub static ref PAYMENTS_COMPLETED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "x67_payments_completed_total",
        "Total number of completed payments",
        &["payment_type"]
    )
    .unwrap();

    // ========== Notification Metrics ==========

    /// Notifications by kind and outcome
    pub static ref NOTIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "x67_notifications_total",
        "Total number of notifications by delivery outcome",
        &["kind", "outcome"]
    )
    .unwrap();

    // ========== Upload Metrics ==========

    /// Uploads by kind
    pub static ref UPLOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "x67_uploads_total",
        "Total number of media uploads",
        &["kind"]
    )
    .unwrap();

    // ========== Background Job Metrics ==========

    /// Background job executions by job type and status
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "x67_background_jobs_total",
        "Total number of background job executions",
        &["job_type", "status"]
    )
    .unwrap();

    /// Background job duration in seconds
    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "x67_background_job_duration_seconds",
        "Background job execution time in seconds",
        &["job_type"],
        vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
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
    }
    String::from_utf8_lossy(&buffer).into_owned()
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

pub fn record_ad_created() {
    ADS_CREATED_TOTAL.inc();
}

pub fn record_ad_view() {
    AD_VIEWS_TOTAL.inc();
}

/// Record a top-up attempt (`success`, `cooldown`, `rejected`)
pub fn record_topup(result: &str) {
    TOPUPS_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_moderation_action(status: &str) {
    MODERATION_ACTIONS_TOTAL.with_label_values(&[status]).inc();
}

/// Record a webhook delivery outcome
pub fn record_webhook(outcome: &str) {
    WEBHOOKS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_payment_completed(payment_type: &str) {
    PAYMENTS_COMPLETED_TOTAL
        .with_label_values(&[payment_type])
        .inc();
}

/// Record a notification outcome (`queued`, `dropped`, `delivered`, `failed`)
pub fn record_notification(kind: &str, outcome: &str) {
    NOTIFICATIONS_TOTAL.with_label_values(&[kind, outcome]).inc();
}

pub fn record_upload(kind: &str) {
    UPLOADS_TOTAL.with_label_values(&[kind]).inc();
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
