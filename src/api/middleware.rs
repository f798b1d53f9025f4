/// Request plumbing shared by the handlers
use crate::metrics;
use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};
use axum_extra::extract::cookie::CookieJar;
use std::time::Instant;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session_token";

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Session token from the `session_token` cookie, else the bearer header
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| extract_bearer_token(headers))
}

/// Record request count and latency
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = metric_path(request.uri().path());
    let start = Instant::now();

    metrics::HTTP_REQUESTS_ACTIVE.inc();
    let response = next.run(request).await;
    metrics::HTTP_REQUESTS_ACTIVE.dec();

    metrics::record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

/// Collapse ids in a path so the metric label set stays bounded
fn metric_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let has_digit = segment.chars().any(|c| c.is_ascii_digit());
            let looks_like_id = (segment.contains('_') && has_digit)
                || (!segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()))
                || segment.contains('.');
            if looks_like_id {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
