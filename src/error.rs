// src/error.rs

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::json;
use thiserror::Error;

/// Request-level error taxonomy. Validation and access denials resolve
/// locally; signature and upstream failures are the ones worth logging.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("unauthorized")]
    Unauthorized,

    /// Deliberately covers both "no such file" and "not purchased" so the
    /// response does not leak object existence.
    #[error("access denied")]
    AccessDenied,

    #[error("invalid signature: {0}")]
    Signature(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl actix_web::ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::AccessDenied | ApiError::Signature(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::Signature(e) => log::warn!("webhook signature rejected: {e}"),
            ApiError::Upstream(e) => log::error!("upstream failure: {e}"),
            ApiError::Database(e) => log::error!("database error: {e}"),
            _ => {}
        }
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}
