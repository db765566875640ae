//! HTTP status-code mapping for the edge (§6: 200/400/401/404/422/500).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("malformed request: {0}")]
    BadRequest(String),
    #[error("signature verification failed: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid CQL: {0}")]
    UnprocessableCql(String),
    #[error("game world is recovering state")]
    Recovering,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UnprocessableCql(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Recovering => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "ok": serde_json::Value::Null, "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<cardinal_tx::VerifyError> for ApiError {
    fn from(err: cardinal_tx::VerifyError) -> Self {
        use cardinal_tx::VerifyError::*;
        match err {
            Storage(e) => ApiError::Internal(e.to_string()),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

impl From<cardinal_store::StoreError> for ApiError {
    fn from(err: cardinal_store::StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
