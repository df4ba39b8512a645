//! Error types for the REST API server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::assistant::AssistantError;
use crate::basket::BasketError;
use crate::pricing::PricingError;
use crate::sales_source::SalesSourceError;
use crate::sqlite_store::StoreError;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Invalid parameter in request
    InvalidParameter(String),
    /// Requested resource does not exist
    NotFound(String),
    /// Price or rule computation failed
    ComputationFailed(String),
    /// The text-generation service could not be reached or refused the request
    UpstreamUnavailable(String),
    /// Too many concurrent chat sessions
    SessionLimitReached,
    /// Internal server error
    InternalError(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::ComputationFailed(msg) => write!(f, "Computation failed: {}", msg),
            ApiError::UpstreamUnavailable(msg) => write!(f, "Upstream unavailable: {}", msg),
            ApiError::SessionLimitReached => write!(f, "Session limit reached"),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ApiError::InvalidParameter(_) => (StatusCode::BAD_REQUEST, "InvalidParameter"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::ComputationFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ComputationFailed"),
            ApiError::UpstreamUnavailable(_) => (StatusCode::BAD_GATEWAY, "UpstreamUnavailable"),
            ApiError::SessionLimitReached => (StatusCode::SERVICE_UNAVAILABLE, "SessionLimitReached"),
            ApiError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        };

        let message = match self {
            ApiError::InvalidParameter(msg)
            | ApiError::NotFound(msg)
            | ApiError::ComputationFailed(msg)
            | ApiError::UpstreamUnavailable(msg)
            | ApiError::InternalError(msg) => msg,
            ApiError::SessionLimitReached => "Maximum number of concurrent sessions reached".to_string(),
        };

        let body = Json(json!({
            "error": error_type,
            "message": message,
        }));

        (status, body).into_response()
    }
}

// Conversions from other error types

impl From<PricingError> for ApiError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::InvalidInput(msg) => ApiError::InvalidParameter(msg),
        }
    }
}

impl From<BasketError> for ApiError {
    fn from(err: BasketError) -> Self {
        match err {
            BasketError::InvalidInput(msg) => ApiError::InvalidParameter(msg),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::NotFound(format!("sale {}", id)),
            _ => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<SalesSourceError> for ApiError {
    fn from(err: SalesSourceError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<AssistantError> for ApiError {
    fn from(err: AssistantError) -> Self {
        match err {
            AssistantError::ClientCreation(msg) => ApiError::InternalError(msg),
            _ => ApiError::UpstreamUnavailable(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::ComputationFailed(err.to_string())
    }
}

impl From<csv::Error> for ApiError {
    fn from(err: csv::Error) -> Self {
        ApiError::InternalError(format!("CSV error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::InvalidParameter("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::UpstreamUnavailable("x".into()), StatusCode::BAD_GATEWAY),
            (ApiError::SessionLimitReached, StatusCode::SERVICE_UNAVAILABLE),
            (ApiError::InternalError("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_conversions() {
        let err: ApiError = PricingError::InvalidInput("bad window".into()).into();
        assert!(matches!(err, ApiError::InvalidParameter(msg) if msg == "bad window"));

        let err: ApiError = StoreError::NotFound(7).into();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err: ApiError = AssistantError::Http("refused".into()).into();
        assert!(matches!(err, ApiError::UpstreamUnavailable(_)));
    }
}
