use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use contest_tracker_libs::{api::MessageResponse, storage::StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthorized,
    #[error("admin privilege required")]
    Forbidden,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("unexpected error")]
    Internal(#[source] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ContestNotFound(_) => ApiError::NotFound(String::from("contest not found")),
            StoreError::BookmarkNotFound { .. } => {
                ApiError::NotFound(String::from("bookmark not found"))
            }
            StoreError::UserNotFound(_) => ApiError::NotFound(String::from("user not found")),
            e => ApiError::Internal(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(e) = &self {
            tracing::error!("request failed cause: {:?}", e);
        }

        (self.status(), Json(MessageResponse::new(&self))).into_response()
    }
}
