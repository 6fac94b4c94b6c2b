use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// ShellError
///
/// Failures of the shell's JSON endpoints. Access decisions are never errors;
/// they come back as redirects.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("query parameter `path` is required")]
    MissingPath,

    #[error("path `{0}` must be absolute")]
    RelativePath(String),
}

impl IntoResponse for ShellError {
    fn into_response(self) -> Response {
        let status = match &self {
            ShellError::MissingPath | ShellError::RelativePath(_) => StatusCode::BAD_REQUEST,
        };
        let body = json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
