/// Unified error types for the marketplace API
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the marketplace
#[derive(Error, Debug)]
pub enum MarketError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Missing, expired or invalid session
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authenticated but not allowed (wrong owner, wrong role, blocked)
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Malformed input, invalid enum values, cooldowns, referenced taxonomy
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payment gateway unreachable or returned a non-success answer
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Media storage errors
    #[error("Media storage error: {0}")]
    MediaStorage(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MarketError {
    /// Human-readable detail without the variant prefix
    pub fn detail(&self) -> String {
        match self {
            MarketError::Authentication(msg)
            | MarketError::Authorization(msg)
            | MarketError::Validation(msg)
            | MarketError::NotFound(msg)
            | MarketError::Gateway(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: String,
}

impl From<validator::ValidationErrors> for MarketError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields: Vec<String> = errors
            .field_errors()
            .keys()
            .map(|field| field.to_string())
            .collect();
        MarketError::Validation(format!("Invalid fields: {}", fields.join(", ")))
    }
}

/// Convert MarketError to HTTP response
impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let (status, error_code, detail) = match &self {
            MarketError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.detail(),
            ),
            MarketError::Authorization(_) => (StatusCode::FORBIDDEN, "Forbidden", self.detail()),
            MarketError::Validation(_) => (StatusCode::BAD_REQUEST, "InvalidRequest", self.detail()),
            MarketError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.detail()),
            MarketError::Gateway(_) => (StatusCode::BAD_GATEWAY, "PaymentGatewayError", self.detail()),
            MarketError::RateLimitExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RateLimitExceeded",
                "Rate limit exceeded".to_string(),
            ),
            MarketError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalServerError",
                    "Internal server error".to_string(), // Don't leak details
                )
            }
            MarketError::Internal(_) | MarketError::Io(_) | MarketError::MediaStorage(_) => {
                tracing::error!("{}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalServerError",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            detail,
        });

        (status, body).into_response()
    }
}

/// Result type alias for marketplace operations
pub type MarketResult<T> = Result<T, MarketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = vec![
            (MarketError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (MarketError::Authentication("x".into()), StatusCode::UNAUTHORIZED),
            (MarketError::Authorization("x".into()), StatusCode::FORBIDDEN),
            (MarketError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (MarketError::Gateway("x".into()), StatusCode::BAD_GATEWAY),
            (MarketError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_detail_strips_prefix() {
        let error = MarketError::NotFound("Ad not found".to_string());
        assert_eq!(error.detail(), "Ad not found");
        assert_eq!(error.to_string(), "Not found: Ad not found");
    }
}
