use serde::Serialize;
use utoipa::ToSchema;

/// Reply to `POST /api/create-session/{sessionId}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateSessionResponse {
    /// Always `true`; creating an existing session is not an error.
    pub ok: bool,
}

/// Reply to `GET /api/session-exists/{sessionId}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionExistsResponse {
    pub exists: bool,
}

/// JSON error body shared by every HTTP error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
