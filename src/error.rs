use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::{dao::storage::StorageError, state::game::SessionId};

/// Message sent to clients when the session store cannot serve a request.
pub const STORE_UNAVAILABLE_MESSAGE: &str = "Session store unavailable";
/// Message sent to clients when a well-formed session id has no record.
pub const SESSION_NOT_FOUND_MESSAGE: &str = "Session not found";
const ANSWERS_LIBRARY_MESSAGE: &str = "Failed to read answers library";

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The session id is well-formed but no record exists.
    #[error("session `{0}` not found")]
    SessionNotFound(SessionId),
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// The answer-set directory could not be listed.
    #[error("failed to read answers library")]
    AnswersLibrary(#[source] std::io::Error),
}

impl ServiceError {
    /// Message safe to hand back to the requesting client.
    pub fn client_message(&self) -> String {
        match self {
            ServiceError::SessionNotFound(_) => SESSION_NOT_FOUND_MESSAGE.into(),
            ServiceError::Unavailable(_) | ServiceError::Degraded => {
                STORE_UNAVAILABLE_MESSAGE.into()
            }
            ServiceError::AnswersLibrary(_) => ANSWERS_LIBRARY_MESSAGE.into(),
        }
    }

    /// Whether the failure comes from the persistence layer.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, ServiceError::Unavailable(_) | ServiceError::Degraded)
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

/// Rejection of an inbound socket payload, carrying the exact client-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RequestError {
    /// Human-readable message sent back in the `error` event.
    pub message: String,
}

impl RequestError {
    /// `sessionId` is absent, `null` or empty.
    pub fn missing_session_id() -> Self {
        Self {
            message: "Session ID is required".into(),
        }
    }

    /// A required field other than the session id is missing.
    pub fn missing_field(label: &str, action: &str) -> Self {
        Self {
            message: format!("{label} is required to {action}"),
        }
    }

    /// Extra field, wrong type or malformed value for `event`.
    pub fn invalid(event: &str) -> Self {
        Self {
            message: format!("Invalid request - {event}"),
        }
    }

    /// The frame itself could not be decoded.
    pub fn malformed_frame() -> Self {
        Self {
            message: "Invalid request".into(),
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("{0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Service unavailable or degraded.
    #[error("{0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.client_message();
        match err {
            ServiceError::SessionNotFound(_) => AppError::NotFound(message),
            ServiceError::Unavailable(_) | ServiceError::Degraded => {
                AppError::ServiceUnavailable(message)
            }
            ServiceError::AnswersLibrary(_) => AppError::Internal(message),
        }
    }
}

impl From<RequestError> for AppError {
    fn from(err: RequestError) -> Self {
        AppError::BadRequest(err.message)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
