use serde::Serialize;
use utoipa::ToSchema;

use crate::{dto::game::PlayerSummary, state::game::Player};

/// Kind-specific part of a [`GameMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GameEvent {
    /// A player attached to the game's realtime feed.
    Join { player: PlayerSummary },
    /// A player gave up or disconnected for good.
    Leave,
    /// A player clicked through to another page.
    Visit { player: PlayerSummary },
    /// A player reached the goal and leads, but can still be overtaken.
    Finish { visits: usize },
    /// A player reached the goal and can no longer be overtaken.
    Gameover,
}

/// Event pushed to every realtime client of one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameMessage {
    /// Player the copy is delivered to, filled in by the fanout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_name: Option<String>,
    /// Player the event is about.
    pub player_name: String,
    /// Free-form detail: visited page, finisher name, ...
    pub message: String,
    #[serde(flatten)]
    pub event: GameEvent,
}

impl GameMessage {
    fn new(player_name: impl Into<String>, message: impl Into<String>, event: GameEvent) -> Self {
        Self {
            recipient_name: None,
            player_name: player_name.into(),
            message: message.into(),
            event,
        }
    }

    pub fn join(player: &Player) -> Self {
        Self::new(
            player.name.clone(),
            "joined",
            GameEvent::Join {
                player: player.into(),
            },
        )
    }

    pub fn leave(player_name: &str) -> Self {
        Self::new(player_name, player_name, GameEvent::Leave)
    }

    pub fn visit(player: &Player, page: &str) -> Self {
        Self::new(
            player.name.clone(),
            page,
            GameEvent::Visit {
                player: player.into(),
            },
        )
    }

    pub fn finish(player: &Player) -> Self {
        Self::new(
            player.name.clone(),
            player.name.clone(),
            GameEvent::Finish {
                visits: player.visits(),
            },
        )
    }

    pub fn gameover(player_name: &str) -> Self {
        Self::new(player_name, player_name, GameEvent::Gameover)
    }

    /// Copy of this message addressed to `recipient`.
    pub fn addressed_to(&self, recipient: &str) -> Self {
        Self {
            recipient_name: Some(recipient.to_string()),
            ..self.clone()
        }
    }
}
