use std::sync::Arc;

use axum::http::HeaderValue;
use tracing::{info, warn};
use validator::Validate;

use crate::{
    dao::models::GameHash,
    dto::{
        game::{
            EnterGameResponse, GameView, JoinGameRequest, LeaveResponse, StartGameRequest,
            VisitResponse, WikiSummary,
        },
        ws::GameMessage,
    },
    error::ServiceError,
    services::{
        page_token::unescape_page,
        session::{Session, SessionKeys},
    },
    state::{SharedState, game::Game},
};

/// Load a game, reporting an absent record as [`ServiceError::NoSuchGame`].
pub async fn load_game(state: &SharedState, hash: &GameHash) -> Result<Arc<Game>, ServiceError> {
    state.games().get_game_by_hash(hash).await.map_err(|err| {
        if err.is_not_found() {
            ServiceError::NoSuchGame(hash.clone())
        } else {
            warn!(game = %hash, error = ?err, "failed to load game");
            ServiceError::Persistence(err)
        }
    })
}

/// Open a new race hosted by the requesting player and bind their session to it.
pub async fn start_game(
    state: &SharedState,
    request: StartGameRequest,
) -> Result<(EnterGameResponse, HeaderValue), ServiceError> {
    request.validate()?;
    let config = state.config();
    let wiki_url = request
        .wiki_url
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| config.default_wiki_url().to_string());

    let game = state
        .games()
        .create_game(&request.player_name, &request.start, &request.goal, &wiki_url)
        .await?;
    let hash = game
        .hash()
        .cloned()
        .ok_or_else(|| ServiceError::InvalidInput("game was not registered".into()))?;

    let response = EnterGameResponse {
        hash: hash.to_string(),
        start_url: state.page_tokens().visit_url(game.start())?,
    };
    let cookie = state.sessions().init(&request.player_name, &hash);
    Ok((response, cookie))
}

/// Add the requesting player to an existing race and bind their session to it.
///
/// No realtime event is sent here; the join event goes out once the player's
/// socket attaches.
pub async fn join_game(
    state: &SharedState,
    request: JoinGameRequest,
) -> Result<(EnterGameResponse, HeaderValue), ServiceError> {
    request.validate()?;
    let hash = GameHash::new(request.id.trim());
    let game = load_game(state, &hash).await?;

    game.can_join(&request.name).await?;
    game.add_player(&request.name).await?;

    let response = EnterGameResponse {
        hash: hash.to_string(),
        start_url: state.page_tokens().visit_url(game.start())?,
    };
    let cookie = state.sessions().init(&request.name, &hash);
    Ok((response, cookie))
}

/// Game page data for `id`, or for the session's game when `id` is absent.
///
/// A session bound to another game, or to a player this game does not know,
/// is dropped; the returned header then clears the cookie.
pub async fn game_overview(
    state: &SharedState,
    session: Option<Session>,
    id: Option<String>,
) -> Result<(GameView, Option<HeaderValue>), ServiceError> {
    let requested = id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .map(GameHash::new);
    let hash = match (requested, &session) {
        (Some(hash), _) => hash,
        (None, Some(session)) => session.game_hash.clone(),
        (None, None) => return Err(ServiceError::InvalidInput("no game selected".into())),
    };

    let game = load_game(state, &hash).await?;

    let mut clear_cookie = None;
    let mut player = None;
    if let Some(session) = session {
        let known = if session.is_for(&hash) {
            game.player(&session.player_name).await
        } else {
            None
        };
        if known.is_none() {
            info!(
                game = %hash,
                session_game = %session.game_hash,
                player = %session.player_name,
                "session does not belong to this game; invalidating"
            );
            clear_cookie = Some(SessionKeys::invalidate());
        }
        player = known;
    }

    let mut view = GameView::new(hash.to_string(), game.overview().await);
    if let Some(player) = player {
        view.visit_url = Some(
            state
                .page_tokens()
                .visit_url(player.last_visited(game.start()))?,
        );
        view.player_name = Some(player.name);
    }
    Ok((view, clear_cookie))
}

/// Record that the session's player opened the page behind `token`.
///
/// Reaching the goal evaluates the winner: a confirmed win is announced as
/// `gameover`, a lead as `finish`. Every other visit is announced as `visit`.
/// Players who already finished or gave up only get their standing back.
pub async fn visit(
    state: &SharedState,
    session: Option<Session>,
    token: &str,
) -> Result<VisitResponse, ServiceError> {
    let page = unescape_page(&state.page_tokens().decrypt(token)?)?;
    let session =
        session.ok_or_else(|| ServiceError::SessionInvalid("no game session".into()))?;
    let game = session.game(state.games()).await.map_err(|err| {
        if err.is_not_found() {
            ServiceError::NoSuchGame(session.game_hash.clone())
        } else {
            ServiceError::Persistence(err)
        }
    })?;

    let name = session.player_name.as_str();
    let player = game.visit(name, &page).await?;
    let reached_goal = page == game.goal();
    let page_url = page_link(game.wiki_url(), &page);

    if player.left_game {
        // Finished or gave up: the path is frozen, so nothing is saved or announced.
        let outcome = if reached_goal {
            game.decide_winner(name).await?
        } else {
            Default::default()
        };
        let winner = game.winner().await;
        return Ok(VisitResponse::new(
            &player,
            page,
            page_url,
            reached_goal,
            outcome,
            winner.as_ref(),
        ));
    }
    state.games().save(&game).await?;

    let outcome = if reached_goal {
        game.evaluate_winner(name).await?
    } else {
        Default::default()
    };

    let message = if outcome.is_winner {
        info!(game = %session.game_hash, player = %name, visits = player.visits(), "race won");
        GameMessage::gameover(name)
    } else if outcome.is_temporary_winner {
        info!(game = %session.game_hash, player = %name, visits = player.visits(), "player leads the race");
        GameMessage::finish(&player)
    } else {
        GameMessage::visit(&player, &page)
    };
    game.broadcast(message).await;

    let winner = game.winner().await;
    Ok(VisitResponse::new(
        &player,
        page,
        page_url,
        reached_goal,
        outcome,
        winner.as_ref(),
    ))
}

/// Take the session's player out of the race.
///
/// Leaving can remove the last obstacle for a leading player, in which case
/// their win is confirmed and announced.
pub async fn leave_game(
    state: &SharedState,
    session: Option<Session>,
) -> Result<LeaveResponse, ServiceError> {
    let session =
        session.ok_or_else(|| ServiceError::SessionInvalid("no game session".into()))?;
    let game = load_game(state, &session.game_hash).await?;
    let name = session.player_name.as_str();

    let changed = game.leave(name).await?;
    if changed {
        game.broadcast(GameMessage::leave(name)).await;
        confirm_pending_winner(&game).await?;
    }

    Ok(LeaveResponse {
        hash: session.game_hash.to_string(),
        player_name: session.player_name.clone(),
        changed,
    })
}

async fn confirm_pending_winner(game: &Game) -> Result<(), ServiceError> {
    if game.is_decided().await {
        return Ok(());
    }
    let Some(leader) = game.winner().await else {
        return Ok(());
    };
    if game.evaluate_winner(&leader.name).await?.is_winner {
        info!(game = ?game.hash(), player = %leader.name, "leader confirmed after a player left");
        game.broadcast(GameMessage::gameover(&leader.name)).await;
    }
    Ok(())
}

/// Encyclopedias a host can pick from.
pub fn list_wikis(state: &SharedState) -> Vec<WikiSummary> {
    state.config().wikis().iter().map(Into::into).collect()
}

fn page_link(wiki_url: &str, page: &str) -> String {
    format!("{}/wiki/{page}", wiki_url.trim_end_matches('/'))
}
