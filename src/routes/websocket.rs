use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    error::{AppError, ServiceError},
    services::websocket_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/client",
    tag = "realtime",
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 401, description = "No valid game session")
    )
)]
/// Upgrade the HTTP connection into the player's realtime game feed.
pub async fn ws_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let session = state
        .sessions()
        .read(&headers)
        .ok_or_else(|| ServiceError::SessionInvalid("websocket requires a game session".into()))?;
    let shared_state = state.clone();
    Ok(ws
        .on_upgrade(move |socket| websocket_service::handle_socket(shared_state, session, socket))
        .into_response())
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/client", get(ws_handler))
}
