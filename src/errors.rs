use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{event, Level};

use crate::{
    auth::{AuthError, UNAUTHORIZED_MESSAGE},
    domain::{InvalidIdError, ListingId},
    dtos::ErrorResponse,
    query::QueryError,
    repositories::StoreError,
};

const INTERNAL_MESSAGE: &str = "internal server error";

/// Every failure a handler can return, each mapped to one status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized access: {0}")]
    Unauthorized(#[from] AuthError),

    #[error(transparent)]
    InvalidId(#[from] InvalidIdError),

    #[error(transparent)]
    InvalidQuery(#[from] QueryError),

    #[error("{0}")]
    BadRequest(String),

    #[error("listing {0} not found")]
    NotFound(ListingId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to issue token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::InvalidId(_) | ApiError::InvalidQuery(_) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Auth and server failures share one fixed message each, the cause only goes to the log.
    fn public_message(&self) -> String {
        match self {
            ApiError::Unauthorized(_) => String::from(UNAUTHORIZED_MESSAGE),
            ApiError::Store(_) | ApiError::Token(_) => String::from(INTERNAL_MESSAGE),
            other => other.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            event!(Level::ERROR, "request failed: {}", self);
        } else if status == StatusCode::UNAUTHORIZED {
            event!(Level::WARN, "request rejected: {}", self);
        } else {
            event!(Level::DEBUG, "request rejected: {}", self);
        }

        let body = ErrorResponse {
            error: true,
            message: self.public_message(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_kind() {
        assert_eq!(
            ApiError::from(AuthError::MissingHeader).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(InvalidIdError(String::from("nope"))).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(QueryError::OutOfRange("page")).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound(ListingId::new()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn auth_failures_do_not_leak_the_cause() {
        let error = ApiError::from(AuthError::InvalidToken(String::from("ExpiredSignature")));
        assert_eq!(error.public_message(), "unauthorized access");
    }

    #[test]
    fn client_errors_explain_themselves() {
        let error = ApiError::from(InvalidIdError(String::from("abc")));
        assert_eq!(error.public_message(), "invalid listing id: abc");
    }
}
