use std::fmt;

use serde::{Deserialize, Serialize};

/// Content-derived identifier of a game, also the key of its stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameHash(String);

impl GameHash {
    /// Wrap an existing hash string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Hash as a store key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GameHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Participant record as persisted inside a [`GameEntity`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntity {
    /// Name, unique within the owning game.
    pub name: String,
    /// Visited page identifiers in order.
    #[serde(default)]
    pub path: Vec<String>,
    /// Whether the player can no longer change who wins.
    #[serde(default)]
    pub left_game: bool,
}

/// One race as persisted by the keyed store.
///
/// The field names are the on-disk contract for saved games.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameEntity {
    /// Name of the player who created the game.
    pub host: String,
    /// Roster in join order; the host is always first.
    pub players: Vec<PlayerEntity>,
    /// Recorded winner, empty while nobody reached the goal.
    #[serde(default)]
    pub winner: String,
    /// Path of the recorded winner.
    #[serde(default)]
    pub winner_path: Vec<String>,
    /// True once the recorded winner can no longer be overtaken.
    #[serde(default)]
    pub winner_confirmed: bool,
    /// Page every player starts from.
    pub start: String,
    /// Page every player races to.
    pub goal: String,
    /// Base URL of the encyclopedia the race runs on.
    #[serde(default)]
    pub wiki_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_storage_field_names() {
        let entity = GameEntity {
            host: "ada".into(),
            players: vec![PlayerEntity {
                name: "ada".into(),
                path: vec!["Rust".into()],
                left_game: false,
            }],
            winner: String::new(),
            winner_path: Vec::new(),
            winner_confirmed: false,
            start: "Rust".into(),
            goal: "Iron".into(),
            wiki_url: "https://en.wikipedia.org".into(),
        };

        let value = serde_json::to_value(&entity).unwrap();
        for field in ["host", "players", "winner", "winnerPath", "start", "goal"] {
            assert!(value.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(value["players"][0]["leftGame"], false);
    }

    #[test]
    fn older_records_without_optional_fields_still_load() {
        let raw = r#"{
            "host": "ada",
            "players": [{ "name": "ada" }],
            "start": "Rust",
            "goal": "Iron"
        }"#;
        let entity: GameEntity = serde_json::from_str(raw).unwrap();
        assert!(entity.winner.is_empty());
        assert!(!entity.winner_confirmed);
        assert!(entity.players[0].path.is_empty());
    }
}
