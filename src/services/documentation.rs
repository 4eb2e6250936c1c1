use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the session sync backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::create_session,
        crate::routes::session::session_exists,
        crate::routes::library::answers_library,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::http::CreateSessionResponse,
            crate::dto::http::SessionExistsResponse,
            crate::dto::http::ErrorResponse,
            crate::dto::ws::ClientFrame,
            crate::dto::ws::ServerEvent,
            crate::dto::ws::ErrorPayload,
            crate::dto::ws::JoinedSession,
            crate::dto::ws::SessionExistence,
            crate::dto::ws::Buzzed,
            crate::state::game::GameState,
            crate::state::game::Answer,
            crate::state::game::GuessedAnswer,
            crate::state::game::Team,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sessions", description = "Session creation and lookup"),
        (name = "library", description = "Answer-set file library"),
        (name = "realtime", description = "WebSocket session synchronisation"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/api/create-session/{session_id}",
            "/api/session-exists/{session_id}",
            "/api/answers-library",
            "/ws",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }
    }
}
