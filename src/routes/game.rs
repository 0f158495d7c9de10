use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, header::SET_COOKIE},
    response::{IntoResponse, Response},
    routing::{get, post},
};

use crate::{
    dto::game::{
        EnterGameResponse, GameQuery, GameView, JoinGameRequest, LeaveResponse, StartGameRequest,
        VisitQuery, VisitResponse, WikiSummary,
    },
    error::AppError,
    services::game_service,
    state::SharedState,
};

/// Routes for starting, joining and playing races.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/wikis", get(list_wikis))
        .route("/start", post(start_game))
        .route("/join", post(join_game))
        .route("/game", get(game_overview))
        .route("/visit", get(visit))
        .route("/leave", post(leave_game))
}

/// Encyclopedias a race can be played on.
#[utoipa::path(
    get,
    path = "/wikis",
    tag = "game",
    responses((status = 200, description = "Configured encyclopedias", body = [WikiSummary]))
)]
pub async fn list_wikis(State(state): State<SharedState>) -> Json<Vec<WikiSummary>> {
    Json(game_service::list_wikis(&state))
}

/// Create a race hosted by the caller and set their session cookie.
#[utoipa::path(
    post,
    path = "/start",
    tag = "game",
    request_body = StartGameRequest,
    responses(
        (status = 200, description = "Game created", body = EnterGameResponse),
        (status = 400, description = "Invalid player name or pages")
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Json(payload): Json<StartGameRequest>,
) -> Result<Response, AppError> {
    let (response, cookie) = game_service::start_game(&state, payload).await?;
    Ok(([(SET_COOKIE, cookie)], Json(response)).into_response())
}

/// Join an existing race and set the caller's session cookie.
#[utoipa::path(
    post,
    path = "/join",
    tag = "game",
    request_body = JoinGameRequest,
    responses(
        (status = 200, description = "Joined", body = EnterGameResponse),
        (status = 404, description = "No such game"),
        (status = 409, description = "Name taken or game already won")
    )
)]
pub async fn join_game(
    State(state): State<SharedState>,
    Json(payload): Json<JoinGameRequest>,
) -> Result<Response, AppError> {
    let (response, cookie) = game_service::join_game(&state, payload).await?;
    Ok(([(SET_COOKIE, cookie)], Json(response)).into_response())
}

/// Game page: roster, winner and the caller's link back into the race.
#[utoipa::path(
    get,
    path = "/game",
    tag = "game",
    params(GameQuery),
    responses(
        (status = 200, description = "Game overview", body = GameView),
        (status = 404, description = "No such game")
    )
)]
pub async fn game_overview(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<GameQuery>,
) -> Result<Response, AppError> {
    let session = state.sessions().read(&headers);
    let (view, clear_cookie) = game_service::game_overview(&state, session, query.id).await?;
    Ok(match clear_cookie {
        Some(cookie) => ([(SET_COOKIE, cookie)], Json(view)).into_response(),
        None => Json(view).into_response(),
    })
}

/// Record a page visit for the caller.
#[utoipa::path(
    get,
    path = "/visit",
    tag = "game",
    params(VisitQuery),
    responses(
        (status = 200, description = "Visit recorded", body = VisitResponse),
        (status = 400, description = "Malformed page token"),
        (status = 401, description = "No valid game session")
    )
)]
pub async fn visit(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<VisitQuery>,
) -> Result<Json<VisitResponse>, AppError> {
    let session = state.sessions().read(&headers);
    let response = game_service::visit(&state, session, &query.page).await?;
    Ok(Json(response))
}

/// Give up: the caller stops competing.
#[utoipa::path(
    post,
    path = "/leave",
    tag = "game",
    responses(
        (status = 200, description = "Player left", body = LeaveResponse),
        (status = 401, description = "No valid game session")
    )
)]
pub async fn leave_game(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<LeaveResponse>, AppError> {
    let session = state.sessions().read(&headers);
    let response = game_service::leave_game(&state, session).await?;
    Ok(Json(response))
}
