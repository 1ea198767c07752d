use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bazaar_core::BazaarError;
use serde_json::json;
use tracing::error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "status": self.status.as_u16(),
            }
        }));

        (self.status, body).into_response()
    }
}

const INTERNAL_MESSAGE: &str = "Internal server error";

impl From<BazaarError> for AppError {
    fn from(err: BazaarError) -> Self {
        match err {
            BazaarError::BadRequest(msg) => Self::bad_request(msg),
            BazaarError::Unauthorized(msg) => Self::unauthorized(msg),
            BazaarError::Forbidden(msg) => Self::forbidden(msg),
            BazaarError::NotFound(msg) => Self::not_found(msg),
            BazaarError::AlreadyExists(msg) => Self::conflict(msg),
            BazaarError::Internal(msg) => {
                error!(error = %msg, "request failed");
                Self::internal(INTERNAL_MESSAGE)
            }
            other => {
                error!(error = %other, "request failed with unmapped error kind");
                Self::internal(INTERNAL_MESSAGE)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_kind_to_its_status() {
        let cases = [
            (BazaarError::bad_request("x"), StatusCode::BAD_REQUEST),
            (BazaarError::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (BazaarError::forbidden("x"), StatusCode::FORBIDDEN),
            (BazaarError::not_found("x"), StatusCode::NOT_FOUND),
            (BazaarError::already_exists("x"), StatusCode::CONFLICT),
            (BazaarError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = AppError::from(BazaarError::internal("redis at 10.0.0.3 refused"));
        assert_eq!(err.message, INTERNAL_MESSAGE);
    }
}
