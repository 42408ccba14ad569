use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::models::task::ValidationErrors;

/// Failures surfaced by the task store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task not found")]
    NotFound,
    #[error("database connection unavailable: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("database query failed: {0}")]
    Query(diesel::result::Error),
}

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => StoreError::NotFound,
            other => StoreError::Query(other),
        }
    }
}

/// Everything a handler can fail with, mapped onto HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::Validation(errors) => {
                HttpResponse::BadRequest().json(json!({ "errors": errors }))
            }
            ApiError::Store(StoreError::NotFound) => {
                HttpResponse::NotFound().json(json!({ "message": "Task not found" }))
            }
            ApiError::Store(err) => {
                tracing::error!(error = %err, "store operation failed");
                HttpResponse::InternalServerError()
                    .json(json!({ "message": "Internal server error" }))
            }
        }
    }
}
