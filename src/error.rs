use axum::{
    Json,
    http::{StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::{models::GameHash, storage::StorageError},
    services::{page_token::TokenError, session::SessionKeys},
    state::game::{GameError, JoinRefusal},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No game is stored under the hash.
    #[error("game `{0}` could not be found in the game store")]
    NoSuchGame(GameHash),
    /// A page token could not be decoded.
    #[error("malformed page token: {0}")]
    MalformedToken(#[from] TokenError),
    /// The requested player name is already used in the game.
    #[error("player name `{0}` is already taken")]
    NameTaken(String),
    /// The game has a winner and accepts no more players.
    #[error("game is locked")]
    GameLocked,
    /// Reading or writing a game record failed.
    #[error("persistence failed")]
    Persistence(#[source] StorageError),
    /// The caller has no usable session for this operation.
    #[error("session invalid: {0}")]
    SessionInvalid(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ServiceError {
    /// Message meant for players rather than logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            ServiceError::NoSuchGame(_) => {
                "There does not seem to be such a game. Maybe it expired, or the link is wrong."
            }
            ServiceError::MalformedToken(_) => {
                "That page link looks mangled. Use the links on the page instead of editing the address."
            }
            ServiceError::NameTaken(_) => "Somebody in this game already uses that name.",
            ServiceError::GameLocked => "This race already has a winner, so nobody can join anymore.",
            ServiceError::Persistence(_) => "The game could not be saved or loaded. Please try again.",
            ServiceError::SessionInvalid(_) => {
                "Your game session is missing or expired. Join the game again to keep playing."
            }
            ServiceError::InvalidInput(_) => "Some of the values you entered are not valid.",
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Persistence(err)
    }
}

impl From<JoinRefusal> for ServiceError {
    fn from(err: JoinRefusal) -> Self {
        match err {
            JoinRefusal::NameTaken(name) => ServiceError::NameTaken(name),
            JoinRefusal::GameLocked => ServiceError::GameLocked,
        }
    }
}

impl From<GameError> for ServiceError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::UnknownPlayer(name) => {
                ServiceError::SessionInvalid(format!("player `{name}` is not part of this game"))
            }
            GameError::Refused(refusal) => refusal.into(),
            GameError::Storage(source) => ServiceError::Persistence(source),
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {err}"))
    }
}

/// Service error on its way to becoming an HTTP response.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct AppError(#[from] pub ServiceError);

impl AppError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ServiceError::NoSuchGame(_) => StatusCode::NOT_FOUND,
            ServiceError::MalformedToken(_) | ServiceError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::NameTaken(_) | ServiceError::GameLocked => StatusCode::CONFLICT,
            ServiceError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::SessionInvalid(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: &'static str,
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let payload = Json(ErrorBody {
            message: self.0.user_message(),
            detail: self.0.to_string(),
        });

        if matches!(self.0, ServiceError::SessionInvalid(_)) {
            return (status, [(SET_COOKIE, SessionKeys::invalidate())], payload).into_response();
        }
        (status, payload).into_response()
    }
}
