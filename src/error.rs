use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// API error: a status code plus a message, rendered as a JSON body.
/// HTTP callers always receive `{"error": "..."}`; realtime failures are
/// never surfaced to the client (log-and-drop), so this type is HTTP-only.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    /// Map a rusqlite error to a 500 with the failed operation named.
    pub fn db(op: &str, err: rusqlite::Error) -> Self {
        Self::internal(format!("{}: {}", op, err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Convenience alias for HTTP handler results.
pub type ApiResult<T> = Result<T, ApiError>;

/// spawn_blocking join failures collapse to a 500.
impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::internal(format!("task join: {}", err))
    }
}
