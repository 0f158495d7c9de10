use axum::Router;

use crate::state::SharedState;

/// Swagger UI and the OpenAPI document.
pub mod docs;
/// Start, join, game, visit and leave endpoints.
pub mod game;
/// Health check endpoint.
pub mod health;
/// Realtime game feed.
pub mod websocket;

/// Compose all route trees and attach the shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(websocket::router())
        .merge(game::router())
        .merge(docs::router())
        .with_state(state)
}
