/// Media upload and serving endpoints
use crate::{
    auth::{AdminAuthContext, AuthContext},
    context::AppContext,
    error::{MarketError, MarketResult},
    media_store::{StoredMedia, UploadKind},
};
use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Stored names are random and never rewritten, so responses are immutable
const CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Build upload routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/upload", post(upload_listing_image))
        .route("/api/upload/banner", post(upload_banner_media))
        .route("/api/uploads/:filename", get(get_upload))
}

/// Upload an ad image (multipart field `file`)
async fn upload_listing_image(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    multipart: Multipart,
) -> MarketResult<Json<StoredMedia>> {
    let (content_type, data) = read_file_field(multipart).await?;
    let stored = ctx
        .media_store
        .store(UploadKind::Listing, content_type.as_deref(), data)
        .await?;

    tracing::debug!("User {} uploaded {}", auth.user.user_id, stored.filename);
    Ok(Json(stored))
}

/// Upload banner media: images or short videos
async fn upload_banner_media(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    multipart: Multipart,
) -> MarketResult<Json<StoredMedia>> {
    let (content_type, data) = read_file_field(multipart).await?;
    let stored = ctx
        .media_store
        .store(UploadKind::Banner, content_type.as_deref(), data)
        .await?;

    tracing::info!("Admin {} uploaded banner media {}", admin.user.user_id, stored.filename);
    Ok(Json(stored))
}

/// First `file` field of a multipart body with its declared content type
async fn read_file_field(mut multipart: Multipart) -> MarketResult<(Option<String>, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| MarketError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().map(String::from);
        let data = field
            .bytes()
            .await
            .map_err(|e| MarketError::Validation(format!("Failed to read upload: {}", e)))?;

        return Ok((content_type, data.to_vec()));
    }

    Err(MarketError::Validation("No file provided".to_string()))
}

/// Serve stored media with caching headers and Range support
async fn get_upload(
    State(ctx): State<AppContext>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> MarketResult<Response> {
    let (data, content_type) = ctx
        .media_store
        .open(&filename)
        .await?
        .ok_or_else(|| MarketError::NotFound("File not found".to_string()))?;

    let total_size = data.len();
    let etag = format!("\"{}\"", filename);

    // If-None-Match for 304 Not Modified
    let not_modified = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == etag)
        .unwrap_or(false);

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::ETAG, header_value(&etag)?);
    response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));

    if not_modified {
        return Ok((StatusCode::NOT_MODIFIED, response_headers).into_response());
    }

    response_headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response_headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_range(v, total_size));

    if let Some((start, end)) = range {
        response_headers.insert(
            header::CONTENT_RANGE,
            header_value(&format!("bytes {}-{}/{}", start, end, total_size))?,
        );
        let partial = data[start..=end].to_vec();

        return Ok((
            StatusCode::PARTIAL_CONTENT,
            response_headers,
            Body::from(partial),
        )
            .into_response());
    }

    Ok((StatusCode::OK, response_headers, Body::from(data)).into_response())
}

fn header_value(value: &str) -> MarketResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| MarketError::Internal(format!("Invalid header value: {}", e)))
}

/// Parse a single `bytes=` range
///
/// Returns inclusive (start, end) positions, or None if unsatisfiable
fn parse_range(range_header: &str, total_size: usize) -> Option<(usize, usize)> {
    let range_spec = range_header.trim().strip_prefix("bytes=")?;
    if total_size == 0 || range_spec.contains(',') {
        return None;
    }

    let (start_str, end_str) = range_spec.split_once('-')?;
    let last = total_size - 1;

    match (start_str.trim(), end_str.trim()) {
        // Suffix range: "bytes=-500" (last 500 bytes)
        ("", suffix) => {
            let suffix = suffix.parse::<usize>().ok().filter(|s| *s > 0)?;
            Some((total_size.saturating_sub(suffix), last))
        }
        // Open-ended range: "bytes=500-"
        (start, "") => {
            let start = start.parse::<usize>().ok()?;
            (start < total_size).then_some((start, last))
        }
        (start, end) => {
            let start = start.parse::<usize>().ok()?;
            let end = end.parse::<usize>().ok()?.min(last);
            (start <= end).then_some((start, end))
        }
    }
}
