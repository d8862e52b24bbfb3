use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use marketbridge_core::{BrokerError, UpstreamError, ValidationError};

/// Any failure while serving a request.
///
/// Every variant renders as `500 {"detail": "<error text>"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Broker(#[from] BrokerError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = self.to_string();
        tracing::warn!(error = %detail, "Request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "detail": detail })),
        )
            .into_response()
    }
}
