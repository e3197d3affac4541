//! Error taxonomy shared by the HTTP and pub/sub adapters.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed parameter. Carries the diagnostic sent to the client.
    #[error("{0}")]
    BadRequest(String),

    #[error("$Unauthorized")]
    Unauthorized,

    #[error("$Signature verification fail")]
    SignatureInvalid,

    /// Endpoint switched off by an operator.
    #[error("")]
    Forbidden,

    #[error("Conflict.")]
    Conflict,

    #[error("Internal error.")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::SignatureInvalid | Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(err) = &self {
            tracing::error!("Request failed: {:#}", err);
        }
        (self.status(), self.to_string()).into_response()
    }
}
