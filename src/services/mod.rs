/// OpenAPI documentation generation.
pub mod documentation;
/// Start, join, visit and leave orchestration.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Opaque page tokens used in visit links.
pub mod page_token;
/// Signed cookie sessions.
pub mod session;
/// WebSocket connection and message delivery service.
pub mod websocket_service;
