use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the wikirace backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::game::list_wikis,
        crate::routes::game::start_game,
        crate::routes::game::join_game,
        crate::routes::game::game_overview,
        crate::routes::game::visit,
        crate::routes::game::leave_game,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game::StartGameRequest,
            crate::dto::game::JoinGameRequest,
            crate::dto::game::EnterGameResponse,
            crate::dto::game::GameView,
            crate::dto::game::PlayerSummary,
            crate::dto::game::VisitResponse,
            crate::dto::game::LeaveResponse,
            crate::dto::game::WikiSummary,
            crate::dto::ws::GameMessage,
            crate::dto::ws::GameEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Starting, joining and playing races"),
        (name = "realtime", description = "WebSocket feed of game events"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_game_routes() {
        let doc = ApiDoc::openapi();
        for path in ["/healthcheck", "/start", "/join", "/game", "/visit", "/leave", "/wikis", "/client"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
