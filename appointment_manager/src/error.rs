use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Selected slot is not available")]
    SlotUnavailable,

    #[error("You are not allowed to perform this action")]
    Forbidden,

    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("Storage failure: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl BookingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::Validation(_) | BookingError::SlotUnavailable => StatusCode::BAD_REQUEST,
            BookingError::NotFound(_) => StatusCode::NOT_FOUND,
            BookingError::Forbidden => StatusCode::FORBIDDEN,
            BookingError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            BookingError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            BookingError::Storage(details) => {
                error!(%details, "Request failed on storage");
                String::from("Internal server error")
            }
            other => other.to_string(),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<DieselError> for BookingError {
    fn from(err: DieselError) -> Self {
        match err {
            // appointments.slot_id is unique, a second booking of one slot lands here
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                BookingError::SlotUnavailable
            }
            other => BookingError::Storage(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for BookingError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        BookingError::Storage(format!("connection pool: {err}"))
    }
}

impl From<validator::ValidationErrors> for BookingError {
    fn from(err: validator::ValidationErrors) -> Self {
        BookingError::Validation(err.to_string())
    }
}

impl From<JsonRejection> for BookingError {
    fn from(rejection: JsonRejection) -> Self {
        BookingError::Validation(rejection.body_text())
    }
}
