use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

use crate::{
    dto::http::{CreateSessionResponse, ErrorResponse, SessionExistsResponse},
    error::{AppError, RequestError},
    services::session_service,
    state::{SharedState, game::SessionId},
};

#[utoipa::path(
    post,
    path = "/api/create-session/{session_id}",
    tag = "sessions",
    params(("session_id" = String, Path, description = "Four characters from [A-Z0-9]")),
    responses(
        (status = 200, description = "Session exists (created now or earlier)", body = CreateSessionResponse),
        (status = 400, description = "Malformed session id", body = ErrorResponse),
        (status = 503, description = "Session store unavailable", body = ErrorResponse)
    )
)]
/// Create a session; creating an existing one is a no-op.
pub async fn create_session(
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
) -> Result<Json<CreateSessionResponse>, AppError> {
    let id = parse_session_id(&raw_id, "create-session")?;
    session_service::create_session(&state, &id).await?;
    Ok(Json(CreateSessionResponse { ok: true }))
}

#[utoipa::path(
    get,
    path = "/api/session-exists/{session_id}",
    tag = "sessions",
    params(("session_id" = String, Path, description = "Four characters from [A-Z0-9]")),
    responses(
        (status = 200, description = "Whether the session has a record", body = SessionExistsResponse),
        (status = 400, description = "Malformed session id", body = ErrorResponse),
        (status = 503, description = "Session store unavailable", body = ErrorResponse)
    )
)]
/// Check whether a session has been created.
pub async fn session_exists(
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
) -> Result<Json<SessionExistsResponse>, AppError> {
    let id = parse_session_id(&raw_id, "session-exists")?;
    let exists = session_service::session_exists(&state, &id).await?;
    Ok(Json(SessionExistsResponse { exists }))
}

fn parse_session_id(raw: &str, route: &str) -> Result<SessionId, AppError> {
    SessionId::parse(raw).map_err(|_| RequestError::invalid(route).into())
}

/// Configure the session routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/api/create-session/{session_id}", post(create_session))
        .route("/api/session-exists/{session_id}", get(session_exists))
}
