//! HTTP error mapping
//!
//! Every failure becomes a fixed, generic message. The cause goes to the log
//! only: unwrap and tag failures must look identical to callers.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use crypto_session::CryptoError;
use shared_protocol::ErrorBody;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing encryptedKey")]
    MissingEncryptedKey,

    #[error("Unreadable request body: {0}")]
    BadBody(String),

    #[error("No caller identity on request")]
    Unauthenticated,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::MissingEncryptedKey => (StatusCode::BAD_REQUEST, "missing encryptedKey"),
            ApiError::BadBody(_) => (StatusCode::BAD_REQUEST, "invalid request"),
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            ApiError::Crypto(e) => match e {
                CryptoError::Decryption(_) => (StatusCode::BAD_REQUEST, "invalid encryptedKey"),
                CryptoError::Authentication | CryptoError::MalformedInput(_) => {
                    (StatusCode::BAD_REQUEST, "invalid message")
                }
                CryptoError::Unauthorized => (StatusCode::UNAUTHORIZED, "invalid session"),
                CryptoError::Configuration(_)
                | CryptoError::Encryption(_)
                | CryptoError::Processing(_)
                | CryptoError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else if status == StatusCode::UNAUTHORIZED {
            debug!(error = %self, "Request rejected");
        } else {
            warn!(error = %self, "Bad request");
        }

        (status, Json(ErrorBody::new(message))).into_response()
    }
}
