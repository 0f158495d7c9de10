use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationErrors};

use crate::{
    config::WikiSite,
    dto::validation::{validate_page, validate_player_name},
    state::game::{GameOverview, Player, WinnerOutcome},
};

/// Payload used to open a new race.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartGameRequest {
    /// Name of the host, who becomes the first player.
    pub player_name: String,
    /// Encyclopedia base URL. Falls back to the configured default.
    #[serde(default)]
    pub wiki_url: Option<String>,
    pub start: String,
    pub goal: String,
}

impl Validate for StartGameRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_player_name(&self.player_name) {
            errors.add("playerName", e);
        }
        if let Err(e) = validate_page(&self.start) {
            errors.add("start", e);
        }
        if let Err(e) = validate_page(&self.goal) {
            errors.add("goal", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Payload used to enter an existing race.
#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinGameRequest {
    /// Hash of the game to join.
    pub id: String,
    pub name: String,
}

impl Validate for JoinGameRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.id.trim().is_empty() {
            let mut err = validator::ValidationError::new("game_id_blank");
            err.message = Some("Game id must not be blank".into());
            errors.add("id", err);
        }
        if let Err(e) = validate_player_name(&self.name) {
            errors.add("name", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Where a player goes once their session is set.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnterGameResponse {
    pub hash: String,
    /// Visit link for the page the player should open next.
    pub start_url: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GameQuery {
    /// Game hash. Defaults to the game of the current session.
    pub id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VisitQuery {
    /// Opaque page token.
    pub page: String,
}

/// Public projection of a player exposed to REST and realtime clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub name: String,
    pub path: Vec<String>,
    pub visits: usize,
    pub left_game: bool,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            name: player.name.clone(),
            path: player.path.clone(),
            visits: player.visits(),
            left_game: player.left_game,
        }
    }
}

/// Game page payload.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub hash: String,
    pub host: String,
    pub start: String,
    pub goal: String,
    pub wiki_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<PlayerSummary>,
    /// True once the winner can no longer be overtaken.
    pub decided: bool,
    /// Players ranked by path length.
    pub players: Vec<PlayerSummary>,
    /// Present when the caller is a player of this game.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
    /// Present when the caller is a player of this game: link back to their current page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visit_url: Option<String>,
}

impl GameView {
    pub fn new(hash: String, overview: GameOverview) -> Self {
        Self {
            hash,
            host: overview.host,
            start: overview.start,
            goal: overview.goal,
            wiki_url: overview.wiki_url,
            winner: overview.winner.as_ref().map(Into::into),
            decided: overview.decided,
            players: overview.players.iter().map(Into::into).collect(),
            player_name: None,
            visit_url: None,
        }
    }
}

/// Result of opening a page.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitResponse {
    pub page: String,
    /// Full URL of the page on the game's encyclopedia.
    pub page_url: String,
    pub visits: usize,
    pub reached_goal: bool,
    pub is_winner: bool,
    pub is_temporary_winner: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<PlayerSummary>,
}

impl VisitResponse {
    pub fn new(
        player: &Player,
        page: String,
        page_url: String,
        reached_goal: bool,
        outcome: WinnerOutcome,
        winner: Option<&Player>,
    ) -> Self {
        Self {
            page,
            page_url,
            visits: player.visits(),
            reached_goal,
            is_winner: outcome.is_winner,
            is_temporary_winner: outcome.is_temporary_winner,
            winner: winner.map(Into::into),
        }
    }
}

/// Result of giving up.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveResponse {
    pub hash: String,
    pub player_name: String,
    /// False when the player had already left.
    pub changed: bool,
}

/// Encyclopedia offered on the start form.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WikiSummary {
    pub name: String,
    pub url: String,
}

impl From<&WikiSite> for WikiSummary {
    fn from(site: &WikiSite) -> Self {
        Self {
            name: site.name.clone(),
            url: site.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_request_uses_camel_case_and_optional_wiki() {
        let request: StartGameRequest =
            serde_json::from_str(r#"{"playerName":"ada","start":"Rust","goal":"Iron"}"#).unwrap();
        assert_eq!(request.player_name, "ada");
        assert!(request.wiki_url.is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn start_request_rejects_blank_fields() {
        let request = StartGameRequest {
            player_name: " ".into(),
            wiki_url: None,
            start: "Rust".into(),
            goal: "".into(),
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("playerName"));
        assert!(fields.contains_key("goal"));
        assert!(!fields.contains_key("start"));
    }

    #[test]
    fn join_request_validation() {
        let ok = JoinGameRequest {
            id: "cafe".into(),
            name: "bob".into(),
        };
        assert!(ok.validate().is_ok());

        let bad = JoinGameRequest {
            id: "".into(),
            name: "x".repeat(65),
        };
        let errors = bad.validate().unwrap_err();
        assert_eq!(errors.field_errors().len(), 2);
    }

    #[test]
    fn player_summary_wire_shape() {
        let mut player = Player::new("ada");
        player.visited("Rust");
        let value = serde_json::to_value(PlayerSummary::from(&player)).unwrap();
        assert_eq!(value["visits"], 1);
        assert_eq!(value["leftGame"], false);
        assert_eq!(value["path"][0], "Rust");
    }
}
