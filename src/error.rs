use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use tracing::error;

use crate::store::StoreError;

/// Failure taxonomy of the aggregation layer. Best-effort sub-operation
/// failures (one file of many failing to delete) are logged where they
/// happen instead of surfacing here.
#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("not found")]
    NotFound,
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("conflict")]
    Conflict,
    #[error("persistence failure: {0}")]
    Persistence(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ServiceError::NotFound,
            StoreError::Conflict => ServiceError::Conflict,
            StoreError::Internal(msg) => ServiceError::Persistence(msg),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("conflict")]
    Conflict,
    #[error("internal error")]
    Internal,
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::NotFound => ApiError::NotFound,
            ServiceError::Validation(msg) => ApiError::BadRequest(msg),
            ServiceError::Conflict => ApiError::Conflict,
            ServiceError::Persistence(msg) => {
                error!(%msg, "store failure");
                ApiError::Internal
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ServiceError::from(e).into()
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        use actix_web::http::StatusCode;
        let status = match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        HttpResponse::build(status).json(ApiErrorBody {
            error: self.to_string(),
        })
    }
}
