/// Answer-set file listing.
pub mod answers_library;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Room and connection event fan-out.
pub mod session_events;
/// Session operations behind every socket event and HTTP route.
pub mod session_service;
/// Session store connection and health supervisor.
pub mod storage_supervisor;
/// WebSocket connection lifecycle and event dispatch.
pub mod websocket_service;
