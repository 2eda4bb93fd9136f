use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hive_storage::StoreError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

const MAX_MESSAGE_LEN: usize = 240;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = %status, error = %self, "api_error");
        }
        let body = ErrorBody {
            error: sanitize_message(&self.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

/// Strip control characters, connection strings and paths before a message leaves the process.
pub fn sanitize_message(message: &str) -> String {
    let mut cleaned = message
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .map(|token| {
            if token.contains("://") {
                "[redacted-url]"
            } else if token.starts_with('/') || token.contains('\\') {
                "[redacted-path]"
            } else {
                token
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.len() > MAX_MESSAGE_LEN {
        let mut cut = MAX_MESSAGE_LEN;
        while !cleaned.is_char_boundary(cut) {
            cut -= 1;
        }
        cleaned.truncate(cut);
        cleaned.push('…');
    }
    if cleaned.trim().is_empty() {
        "unexpected error".to_string()
    } else {
        cleaned
    }
}
