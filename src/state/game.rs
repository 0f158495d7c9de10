use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::{
    dao::{
        models::{GameEntity, GameHash, PlayerEntity},
        storage::{StorageError, StorageResult},
    },
    dto::ws::GameMessage,
    state::fanout::BroadcastHub,
};

/// Sink the game notifies after each durable mutation.
///
/// Implemented by the game store; the game never talks to storage itself.
pub trait GameSaver: Send + Sync {
    /// Store `entity` as the current record of `hash`.
    fn save_game(&self, hash: &GameHash, entity: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
}

/// Collaborators a persisted game reports to.
#[derive(Clone)]
pub struct GameHooks {
    /// Receives every snapshot to persist.
    pub saver: Arc<dyn GameSaver>,
    /// Realtime connections of the game.
    pub fanout: Arc<BroadcastHub>,
}

/// Whether a game already owns a stored identity.
#[derive(Clone)]
pub enum GameIdentity {
    /// Built in memory only; saves and broadcasts are no-ops.
    Transient,
    /// Registered under `hash` in the game store.
    Persisted {
        /// Key of the stored record.
        hash: GameHash,
        /// Save and broadcast targets.
        hooks: GameHooks,
    },
}

/// Reasons a join request is turned down.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinRefusal {
    /// Another player already uses the name.
    #[error("player name `{0}` is already taken")]
    NameTaken(String),
    /// A winner is recorded, so the roster is closed.
    #[error("game already has a winner")]
    GameLocked,
}

/// Failures of roster and winner operations.
#[derive(Debug, Error)]
pub enum GameError {
    /// No player of that name is in the roster.
    #[error("player `{0}` is not part of this game")]
    UnknownPlayer(String),
    /// The join rules turned the player down.
    #[error(transparent)]
    Refused(#[from] JoinRefusal),
    /// Saving the game failed.
    #[error("failed to persist game")]
    Storage(#[from] StorageError),
}

/// Participant of a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Unique within the game.
    pub name: String,
    /// Pages opened so far, in order.
    pub path: Vec<String>,
    /// Set once the player finished or gave up; their path no longer grows.
    pub left_game: bool,
}

impl Player {
    /// Fresh player with an empty path.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: Vec::new(),
            left_game: false,
        }
    }

    /// Record a visit; reloading the current page does not count twice.
    ///
    /// Returns whether the path grew. The path of a player who left is frozen.
    pub fn visited(&mut self, page: &str) -> bool {
        if self.left_game || self.path.last().is_some_and(|last| last == page) {
            return false;
        }
        self.path.push(page.to_string());
        true
    }

    /// Page the player is currently on, or `start` before the first visit.
    pub fn last_visited<'a>(&'a self, start: &'a str) -> &'a str {
        self.path.last().map(String::as_str).unwrap_or(start)
    }

    /// Length of the path.
    pub fn visits(&self) -> usize {
        self.path.len()
    }

    fn is_on(&self, page: &str) -> bool {
        self.path.last().is_some_and(|last| last == page)
    }
}

impl From<PlayerEntity> for Player {
    fn from(value: PlayerEntity) -> Self {
        Self {
            name: value.name,
            path: value.path,
            left_game: value.left_game,
        }
    }
}

impl From<&Player> for PlayerEntity {
    fn from(value: &Player) -> Self {
        Self {
            name: value.name.clone(),
            path: value.path.clone(),
            left_game: value.left_game,
        }
    }
}

/// Result of a winner evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WinnerOutcome {
    /// No remaining active player can beat this player.
    pub is_winner: bool,
    /// This player currently leads.
    pub is_temporary_winner: bool,
}

/// Consistent snapshot of a game for display.
#[derive(Debug, Clone)]
pub struct GameOverview {
    /// Name of the creator.
    pub host: String,
    /// Page every player starts from.
    pub start: String,
    /// Page every player races to.
    pub goal: String,
    /// Encyclopedia base URL.
    pub wiki_url: String,
    /// Recorded winner, confirmed or not.
    pub winner: Option<Player>,
    /// Whether the winner can no longer be overtaken.
    pub decided: bool,
    /// Roster ordered like [`Game::sorted_players`].
    pub players: Vec<Player>,
}

#[derive(Debug, Clone, Default)]
struct WinnerRecord {
    name: Option<String>,
    path: Vec<String>,
    confirmed: bool,
}

/// One race: roster, fixed endpoints and the recorded winner.
///
/// Lock order is always `winner` before `roster`.
pub struct Game {
    identity: GameIdentity,
    host: String,
    start: String,
    goal: String,
    wiki_url: String,
    winner: RwLock<WinnerRecord>,
    roster: RwLock<Vec<Player>>,
    persist_gate: Mutex<()>,
}

impl Game {
    /// Create a transient game with the host seeded as the first player.
    pub fn new(
        host: impl Into<String>,
        start: impl Into<String>,
        goal: impl Into<String>,
        wiki_url: impl Into<String>,
    ) -> Self {
        let host = host.into();
        let roster = vec![Player::new(host.clone())];
        Self {
            identity: GameIdentity::Transient,
            host,
            start: start.into(),
            goal: goal.into(),
            wiki_url: wiki_url.into(),
            winner: RwLock::new(WinnerRecord::default()),
            roster: RwLock::new(roster),
            persist_gate: Mutex::new(()),
        }
    }

    /// Rebuild a game from its stored record.
    pub fn from_entity(entity: GameEntity, identity: GameIdentity) -> Self {
        let winner = WinnerRecord {
            name: Some(entity.winner).filter(|name| !name.is_empty()),
            path: entity.winner_path,
            confirmed: entity.winner_confirmed,
        };
        Self {
            identity,
            host: entity.host,
            start: entity.start,
            goal: entity.goal,
            wiki_url: entity.wiki_url,
            winner: RwLock::new(winner),
            roster: RwLock::new(entity.players.into_iter().map(Into::into).collect()),
            persist_gate: Mutex::new(()),
        }
    }

    /// Attach the stored identity to a freshly created game.
    pub fn into_persisted(mut self, hash: GameHash, hooks: GameHooks) -> Self {
        self.identity = GameIdentity::Persisted { hash, hooks };
        self
    }

    /// Store key, once the game is persisted.
    pub fn hash(&self) -> Option<&GameHash> {
        match &self.identity {
            GameIdentity::Transient => None,
            GameIdentity::Persisted { hash, .. } => Some(hash),
        }
    }

    /// Name of the player who created the game.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Page every player starts from.
    pub fn start(&self) -> &str {
        &self.start
    }

    /// Page every player races to.
    pub fn goal(&self) -> &str {
        &self.goal
    }

    /// Encyclopedia base URL.
    pub fn wiki_url(&self) -> &str {
        &self.wiki_url
    }

    /// Check whether `name` may join right now.
    pub async fn can_join(&self, name: &str) -> Result<(), JoinRefusal> {
        let winner = self.winner.read().await;
        let roster = self.roster.read().await;
        Self::check_join(&winner, &roster, name)
    }

    fn check_join(winner: &WinnerRecord, roster: &[Player], name: &str) -> Result<(), JoinRefusal> {
        if roster.iter().any(|player| player.name == name) {
            return Err(JoinRefusal::NameTaken(name.to_string()));
        }
        if winner.name.is_some() {
            return Err(JoinRefusal::GameLocked);
        }
        Ok(())
    }

    /// Append a new player with an empty path and persist the game.
    pub async fn add_player(&self, name: &str) -> Result<(), GameError> {
        {
            let winner = self.winner.read().await;
            let mut roster = self.roster.write().await;
            Self::check_join(&winner, &roster, name)?;
            roster.push(Player::new(name));
        }
        info!(game = ?self.hash(), player = %name, "player joined");
        self.persist().await?;
        Ok(())
    }

    /// Whether `name` is in the roster.
    pub async fn has_player(&self, name: &str) -> bool {
        self.roster.read().await.iter().any(|player| player.name == name)
    }

    /// Snapshot of the named player.
    pub async fn player(&self, name: &str) -> Option<Player> {
        self.roster
            .read()
            .await
            .iter()
            .find(|player| player.name == name)
            .cloned()
    }

    /// Roster ordered by ascending path length; equal lengths keep join order.
    pub async fn sorted_players(&self) -> Vec<Player> {
        let mut players = self.roster.read().await.clone();
        players.sort_by_key(Player::visits);
        players
    }

    /// Record that `name` opened `page`, returning the player afterwards.
    ///
    /// Players who left keep their path unchanged.
    pub async fn visit(&self, name: &str, page: &str) -> Result<Player, GameError> {
        let mut roster = self.roster.write().await;
        let player = roster
            .iter_mut()
            .find(|player| player.name == name)
            .ok_or_else(|| GameError::UnknownPlayer(name.to_string()))?;
        if !player.visited(page) {
            debug!(player = %name, page = %page, left = player.left_game, "visit not added to path");
        }
        Ok(player.clone())
    }

    /// Mark `name` as no longer competing. Returns whether anything changed.
    pub async fn leave(&self, name: &str) -> Result<bool, GameError> {
        let changed = {
            let mut roster = self.roster.write().await;
            let player = roster
                .iter_mut()
                .find(|player| player.name == name)
                .ok_or_else(|| GameError::UnknownPlayer(name.to_string()))?;
            !std::mem::replace(&mut player.left_game, true)
        };
        if changed {
            info!(game = ?self.hash(), player = %name, "player left the race");
            self.persist().await?;
        }
        Ok(changed)
    }

    /// Read-only winner decision for `name`.
    ///
    /// Nothing is recorded; two calls are not atomic with respect to
    /// concurrent [`Game::evaluate_winner`] commits.
    pub async fn decide_winner(&self, name: &str) -> Result<WinnerOutcome, GameError> {
        let winner = self.winner.read().await;
        let roster = self.roster.read().await;
        decide(&winner, &roster, &self.goal, name)
    }

    /// Decide whether `name` wins and record them as the game's winner if so.
    ///
    /// The recorded winner and the player's `left_game` flag change under the
    /// winner write lock, so concurrent evaluations on the same game serialize.
    /// A confirmed winner is terminal: later finishers still get their outcome
    /// but never replace the record. Re-evaluating the recorded winner can only
    /// confirm them; their recorded path is never rewritten.
    pub async fn evaluate_winner(&self, name: &str) -> Result<WinnerOutcome, GameError> {
        let (outcome, changed) = {
            let mut winner = self.winner.write().await;
            let mut roster = self.roster.write().await;
            let outcome = decide(&winner, &roster, &self.goal, name)?;

            let mut changed = false;
            if outcome.is_winner || outcome.is_temporary_winner {
                let player = roster
                    .iter_mut()
                    .find(|player| player.name == name)
                    .ok_or_else(|| GameError::UnknownPlayer(name.to_string()))?;
                if winner.name.as_deref() == Some(name) {
                    if outcome.is_winner && !winner.confirmed {
                        winner.confirmed = true;
                        changed = true;
                    }
                    if !player.left_game {
                        player.left_game = true;
                        changed = true;
                    }
                } else if winner.confirmed {
                    debug!(player = %name, "winner already confirmed; record kept");
                } else {
                    player.left_game = true;
                    winner.name = Some(player.name.clone());
                    winner.path = player.path.clone();
                    winner.confirmed = outcome.is_winner;
                    changed = true;
                }
            }
            (outcome, changed)
        };

        if changed {
            info!(
                game = ?self.hash(),
                player = %name,
                confirmed = outcome.is_winner,
                "winner recorded"
            );
            self.persist().await?;
        }
        Ok(outcome)
    }

    /// Currently recorded winner, if any.
    pub async fn winner(&self) -> Option<Player> {
        let winner = self.winner.read().await;
        let name = winner.name.as_deref()?;
        self.roster
            .read()
            .await
            .iter()
            .find(|player| player.name == name)
            .cloned()
    }

    /// Whether the recorded winner can no longer be overtaken.
    pub async fn is_decided(&self) -> bool {
        self.winner.read().await.confirmed
    }

    /// Host, endpoints, winner and ranked roster taken under one read.
    pub async fn overview(&self) -> GameOverview {
        let winner = self.winner.read().await;
        let roster = self.roster.read().await;
        let mut players = roster.clone();
        players.sort_by_key(Player::visits);
        GameOverview {
            host: self.host.clone(),
            start: self.start.clone(),
            goal: self.goal.clone(),
            wiki_url: self.wiki_url.clone(),
            winner: winner
                .name
                .as_deref()
                .and_then(|name| roster.iter().find(|player| player.name == name).cloned()),
            decided: winner.confirmed,
            players,
        }
    }

    /// Consistent snapshot of the durable fields.
    pub async fn to_entity(&self) -> GameEntity {
        let winner = self.winner.read().await;
        let roster = self.roster.read().await;
        GameEntity {
            host: self.host.clone(),
            players: roster.iter().map(Into::into).collect(),
            winner: winner.name.clone().unwrap_or_default(),
            winner_path: winner.path.clone(),
            winner_confirmed: winner.confirmed,
            start: self.start.clone(),
            goal: self.goal.clone(),
            wiki_url: self.wiki_url.clone(),
        }
    }

    /// Hand the current state to the game store.
    ///
    /// Saves are serialized per game so the last write always carries the
    /// latest state.
    pub async fn persist(&self) -> StorageResult<()> {
        let GameIdentity::Persisted { hash, hooks } = &self.identity else {
            return Ok(());
        };
        let _gate = self.persist_gate.lock().await;
        let entity = self.to_entity().await;
        hooks.saver.save_game(hash, entity).await.inspect_err(|err| {
            error!(game = %hash, error = ?err, "failed to persist game");
        })
    }

    /// Deliver `message` to every realtime client of this game.
    pub async fn broadcast(&self, message: GameMessage) {
        if let GameIdentity::Persisted { hash, hooks } = &self.identity {
            hooks.fanout.broadcast(hash, message).await;
        }
    }
}

fn decide(
    winner: &WinnerRecord,
    roster: &[Player],
    goal: &str,
    name: &str,
) -> Result<WinnerOutcome, GameError> {
    let player = roster
        .iter()
        .find(|player| player.name == name)
        .ok_or_else(|| GameError::UnknownPlayer(name.to_string()))?;

    let is_recorded = winner.name.as_deref() == Some(name);
    // A player who gave up without being recorded cannot win anymore.
    if !player.is_on(goal) || (player.left_game && !is_recorded) {
        return Ok(WinnerOutcome::default());
    }

    let is_temporary_winner = is_recorded
        || winner.name.is_none()
        || winner.path.len() > player.visits();

    // Players who left cannot improve, so only active ones block confirmation.
    let beatable = roster
        .iter()
        .any(|other| other.name != name && !other.left_game && other.visits() < player.visits());

    Ok(WinnerOutcome {
        is_winner: is_temporary_winner && !beatable,
        is_temporary_winner,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex as StdMutex;

    const START: &str = "start page";
    const GOAL: &str = "goal page";

    fn outcome(is_winner: bool, is_temporary_winner: bool) -> WinnerOutcome {
        WinnerOutcome {
            is_winner,
            is_temporary_winner,
        }
    }

    async fn two_player_game() -> Game {
        let game = Game::new("player 1", START, GOAL, "https://en.wikipedia.org");
        game.add_player("player 2").await.unwrap();
        game.visit("player 1", START).await.unwrap();
        game.visit("player 2", START).await.unwrap();
        game
    }

    #[derive(Default)]
    struct RecordingSaver {
        saved: StdMutex<Vec<GameEntity>>,
    }

    impl GameSaver for RecordingSaver {
        fn save_game(&self, _hash: &GameHash, entity: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.saved.lock().unwrap().push(entity);
            Box::pin(async { Ok(()) })
        }
    }

    fn persisted(game: Game, saver: Arc<RecordingSaver>) -> Game {
        let store = Arc::new(crate::dao::keyed_store::MemoryKeyedStore::new());
        game.into_persisted(
            GameHash::new("cafe"),
            GameHooks {
                saver,
                fanout: Arc::new(BroadcastHub::new(store, 4)),
            },
        )
    }

    #[tokio::test]
    async fn host_is_first_player() {
        let game = Game::new("player 1", START, GOAL, "");
        let players = game.sorted_players().await;
        assert_eq!(game.host(), "player 1");
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].name, "player 1");
        assert!(game.hash().is_none());
    }

    #[test]
    fn reload_does_not_grow_path() {
        let mut player = Player::new("ada");
        assert!(player.visited("Rust"));
        assert!(!player.visited("Rust"));
        assert!(player.visited("Iron"));
        assert!(player.visited("Rust"));
        assert_eq!(player.visits(), 3);
    }

    #[test]
    fn last_visited_falls_back_to_start() {
        let mut player = Player::new("ada");
        assert_eq!(player.last_visited(START), START);
        player.visited("Iron");
        assert_eq!(player.last_visited(START), "Iron");
    }

    #[tokio::test]
    async fn nobody_wins_at_start() {
        let game = two_player_game().await;
        assert_eq!(game.evaluate_winner("player 1").await.unwrap(), outcome(false, false));
        assert_eq!(game.evaluate_winner("player 2").await.unwrap(), outcome(false, false));
        assert!(game.winner().await.is_none());
    }

    #[tokio::test]
    async fn lone_finisher_is_confirmed() {
        let game = two_player_game().await;
        game.visit("player 1", "other page").await.unwrap();
        game.visit("player 2", GOAL).await.unwrap();

        assert_eq!(game.evaluate_winner("player 1").await.unwrap(), outcome(false, false));
        assert_eq!(game.evaluate_winner("player 2").await.unwrap(), outcome(true, true));

        let winner = game.winner().await.unwrap();
        assert_eq!(winner.name, "player 2");
        assert!(winner.left_game);
        assert!(game.is_decided().await);
    }

    #[tokio::test]
    async fn shorter_active_player_blocks_confirmation() {
        let game = Game::new("a", START, GOAL, "");
        game.add_player("b").await.unwrap();
        game.add_player("c").await.unwrap();

        for page in ["x", "y", GOAL] {
            game.visit("a", page).await.unwrap();
        }
        game.visit("c", "x").await.unwrap();
        assert_eq!(game.evaluate_winner("a").await.unwrap(), outcome(false, true));

        game.visit("b", "x").await.unwrap();
        game.visit("b", GOAL).await.unwrap();
        assert_eq!(game.evaluate_winner("b").await.unwrap(), outcome(false, true));
        assert_eq!(game.winner().await.unwrap().name, "b");
        assert!(!game.is_decided().await);
    }

    #[tokio::test]
    async fn longer_late_finisher_is_not_temporary_winner() {
        let game = two_player_game().await;
        game.visit("player 2", "detour").await.unwrap();
        game.visit("player 1", GOAL).await.unwrap();
        assert_eq!(game.evaluate_winner("player 1").await.unwrap(), outcome(true, true));

        game.visit("player 2", GOAL).await.unwrap();
        assert_eq!(game.evaluate_winner("player 2").await.unwrap(), outcome(false, false));
        assert_eq!(game.winner().await.unwrap().name, "player 1");
    }

    #[tokio::test]
    async fn equal_path_does_not_take_over() {
        let game = two_player_game().await;
        game.visit("player 1", GOAL).await.unwrap();
        // player 2 still active with a shorter path.
        assert_eq!(game.evaluate_winner("player 1").await.unwrap(), outcome(false, true));

        game.visit("player 2", GOAL).await.unwrap();
        assert_eq!(game.evaluate_winner("player 2").await.unwrap(), outcome(false, false));
        assert_eq!(game.winner().await.unwrap().name, "player 1");
    }

    #[tokio::test]
    async fn repeated_evaluation_is_stable() {
        let saver = Arc::new(RecordingSaver::default());
        let game = persisted(two_player_game().await, saver.clone());
        game.visit("player 2", GOAL).await.unwrap();

        let first = game.evaluate_winner("player 2").await.unwrap();
        let saves = saver.saved.lock().unwrap().len();
        let second = game.evaluate_winner("player 2").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(saver.saved.lock().unwrap().len(), saves);
    }

    #[tokio::test]
    async fn decide_winner_records_nothing() {
        let game = two_player_game().await;
        game.visit("player 2", GOAL).await.unwrap();
        assert_eq!(game.decide_winner("player 2").await.unwrap(), outcome(false, true));
        assert!(game.winner().await.is_none());
    }

    #[tokio::test]
    async fn join_rules() {
        let game = two_player_game().await;
        assert_eq!(
            game.can_join("player 2").await,
            Err(JoinRefusal::NameTaken("player 2".into()))
        );
        assert_eq!(game.can_join("player 3").await, Ok(()));

        game.visit("player 1", GOAL).await.unwrap();
        game.evaluate_winner("player 1").await.unwrap();
        assert_eq!(game.can_join("player 3").await, Err(JoinRefusal::GameLocked));
        assert!(matches!(
            game.add_player("player 3").await,
            Err(GameError::Refused(JoinRefusal::GameLocked))
        ));
    }

    #[tokio::test]
    async fn leaving_unblocks_confirmation() {
        let game = two_player_game().await;
        game.add_player("player 3").await.unwrap();
        game.visit("player 1", GOAL).await.unwrap();
        assert_eq!(game.evaluate_winner("player 1").await.unwrap(), outcome(false, true));

        assert!(game.leave("player 3").await.unwrap());
        assert!(!game.leave("player 3").await.unwrap());
        // player 2 catches up in length without reaching the goal.
        game.visit("player 2", "detour").await.unwrap();
        assert_eq!(game.evaluate_winner("player 1").await.unwrap(), outcome(true, true));
        assert!(game.is_decided().await);
    }

    #[test]
    fn left_player_path_is_frozen() {
        let mut player = Player::new("ada");
        player.visited("Rust");
        player.left_game = true;
        assert!(!player.visited("Iron"));
        assert_eq!(player.path, vec!["Rust".to_string()]);
    }

    #[tokio::test]
    async fn recorded_winner_path_is_never_rewritten() {
        let saver = Arc::new(RecordingSaver::default());
        let game = persisted(Game::new("a", START, GOAL, ""), saver.clone());
        game.add_player("b").await.unwrap();
        game.visit("b", "x").await.unwrap();
        game.visit("b", "y").await.unwrap();

        game.visit("a", GOAL).await.unwrap();
        assert_eq!(game.evaluate_winner("a").await.unwrap(), outcome(true, true));
        let saves = saver.saved.lock().unwrap().len();

        for page in ["z", "w", GOAL] {
            let player = game.visit("a", page).await.unwrap();
            assert_eq!(player.visits(), 1);
        }
        assert_eq!(game.evaluate_winner("a").await.unwrap(), outcome(true, true));

        let entity = game.to_entity().await;
        assert_eq!(entity.winner_path, vec![GOAL.to_string()]);
        assert!(entity.winner_confirmed);
        assert_eq!(saver.saved.lock().unwrap().len(), saves);
    }

    #[tokio::test]
    async fn player_who_gave_up_cannot_win() {
        let game = Game::new("a", START, GOAL, "");
        game.add_player("b").await.unwrap();
        game.visit("a", "x").await.unwrap();

        game.visit("b", GOAL).await.unwrap();
        assert!(game.leave("b").await.unwrap());
        assert_eq!(game.decide_winner("b").await.unwrap(), outcome(false, false));
        assert_eq!(game.evaluate_winner("b").await.unwrap(), outcome(false, false));
        assert!(game.winner().await.is_none());

        // Visits after giving up do not move the player either.
        game.leave("a").await.unwrap();
        game.visit("a", GOAL).await.unwrap();
        assert_eq!(game.evaluate_winner("a").await.unwrap(), outcome(false, false));
        assert!(game.winner().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_finishers_keep_the_shortest_path() {
        let saver = Arc::new(RecordingSaver::default());
        let game = Arc::new(persisted(Game::new("p1", START, GOAL, ""), saver.clone()));
        let paths: [&[&str]; 4] = [
            &["a", "b", "c", GOAL],
            &["a", "b", GOAL],
            &["a", GOAL],
            &[GOAL],
        ];
        for (index, path) in paths.iter().enumerate() {
            let name = format!("p{}", index + 1);
            if index > 0 {
                game.add_player(&name).await.unwrap();
            }
            for page in *path {
                game.visit(&name, page).await.unwrap();
            }
        }
        let baseline = saver.saved.lock().unwrap().len();

        let handles: Vec<_> = (1..=paths.len())
            .map(|index| {
                let game = game.clone();
                let name = format!("p{index}");
                tokio::spawn(async move { (name.clone(), game.evaluate_winner(&name).await.unwrap()) })
            })
            .collect();
        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }

        // Only the shortest finisher can be confirmed: everyone else sees an active shorter rival.
        for (name, result) in &outcomes {
            assert_eq!(result.is_winner, name == "p4", "{name}: {result:?}");
        }
        let winner = game.winner().await.unwrap();
        assert_eq!(winner.name, "p4");
        assert!(game.is_decided().await);

        let saved = saver.saved.lock().unwrap()[baseline..].to_vec();
        let changes = outcomes
            .iter()
            .filter(|(_, result)| result.is_temporary_winner)
            .count();
        assert_eq!(saved.len(), changes);
        let lengths: Vec<_> = saved.iter().map(|entity| entity.winner_path.len()).collect();
        assert!(lengths.windows(2).all(|pair| pair[0] >= pair[1]), "{lengths:?}");
        let last = saved.last().unwrap();
        assert_eq!(last.winner, "p4");
        assert_eq!(last.winner_path, vec![GOAL.to_string()]);
        assert!(last.winner_confirmed);

        for index in 1..=paths.len() {
            game.evaluate_winner(&format!("p{index}")).await.unwrap();
        }
        assert_eq!(saver.saved.lock().unwrap().len(), baseline + saved.len());
    }

    #[tokio::test]
    async fn sorted_players_orders_by_path_length() {
        let game = two_player_game().await;
        game.add_player("player 3").await.unwrap();
        game.visit("player 1", "x").await.unwrap();

        let names: Vec<_> = game
            .sorted_players()
            .await
            .into_iter()
            .map(|player| player.name)
            .collect();
        assert_eq!(names, ["player 3", "player 2", "player 1"]);
    }

    #[tokio::test]
    async fn mutations_reach_the_saver() {
        let saver = Arc::new(RecordingSaver::default());
        let game = persisted(Game::new("ada", START, GOAL, ""), saver.clone());

        game.add_player("bob").await.unwrap();
        game.visit("bob", GOAL).await.unwrap();
        game.evaluate_winner("bob").await.unwrap();

        let saved = saver.saved.lock().unwrap();
        let last = saved.last().unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(last.winner, "bob");
        assert_eq!(last.winner_path, vec![GOAL.to_string()]);
        assert!(last.players[1].left_game);
    }

    #[tokio::test]
    async fn unknown_player_is_an_error() {
        let game = Game::new("ada", START, GOAL, "");
        assert!(matches!(
            game.visit("nobody", "x").await,
            Err(GameError::UnknownPlayer(_))
        ));
        assert!(matches!(
            game.evaluate_winner("nobody").await,
            Err(GameError::UnknownPlayer(_))
        ));
    }

    #[tokio::test]
    async fn overview_reflects_winner_and_ranking() {
        let game = two_player_game().await;
        game.visit("player 1", "x").await.unwrap();
        game.visit("player 2", GOAL).await.unwrap();
        game.evaluate_winner("player 2").await.unwrap();

        let overview = game.overview().await;
        assert_eq!(overview.host, "player 1");
        assert_eq!(overview.winner.unwrap().name, "player 2");
        assert!(overview.decided);
        assert_eq!(overview.players.len(), 2);
        assert_eq!(overview.players[0].visits(), 2);
    }

    #[tokio::test]
    async fn entity_round_trip_keeps_winner() {
        let game = two_player_game().await;
        game.visit("player 1", "x").await.unwrap();
        game.visit("player 2", GOAL).await.unwrap();
        game.evaluate_winner("player 2").await.unwrap();

        let restored = Game::from_entity(game.to_entity().await, GameIdentity::Transient);
        assert_eq!(restored.winner().await.unwrap().name, "player 2");
        assert!(restored.is_decided().await);
        assert_eq!(restored.can_join("newcomer").await, Err(JoinRefusal::GameLocked));
    }
}
