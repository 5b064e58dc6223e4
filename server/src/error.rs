use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use notepin_shared::ValidationError;
use serde::Serialize;
use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unknown page")]
    UnknownPage,
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("invalid comment id")]
    InvalidId,
    #[error("comment text exceeds {0} characters")]
    TextTooLong(usize),
    #[error("comment {0} already exists")]
    Duplicate(String),
    #[error("comment {0} not found")]
    NotFound(String),
    #[error("page already holds {0} comments")]
    PageFull(usize),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnknownPage | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Invalid(_) | ApiError::InvalidId | ApiError::TextTooLong(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Duplicate(_) => StatusCode::CONFLICT,
            ApiError::PageFull(_) => StatusCode::INSUFFICIENT_STORAGE,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
