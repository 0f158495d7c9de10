//! Durable, pooled access to games keyed by their content-derived hash.

use std::sync::{Arc, Mutex};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::{
    dao::{
        keyed_store::KeyedStore,
        models::{GameEntity, GameHash},
        storage::{StorageError, StorageResult},
    },
    state::{
        fanout::BroadcastHub,
        game::{Game, GameHooks, GameIdentity, GameSaver},
    },
};

/// Running hash used to derive game identifiers.
///
/// Every call feeds more bytes into the same hasher, so successive digests
/// differ even for identical inputs.
pub struct GameIdGenerator {
    hasher: Mutex<Sha256>,
}

impl GameIdGenerator {
    /// Seed with the current time so restarts do not replay old identifiers.
    pub fn new() -> Self {
        let now = OffsetDateTime::now_utc().unix_timestamp_nanos();
        Self::with_seed(&now.to_le_bytes())
    }

    /// Deterministic generator, for tests and reproducible ids.
    pub fn with_seed(seed: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        Self {
            hasher: Mutex::new(hasher),
        }
    }

    /// Feed `bytes` and return the digest of everything fed so far.
    pub fn next_digest(&self, bytes: &[u8]) -> GameHash {
        let mut hasher = self
            .hasher
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        hasher.update(bytes);
        GameHash::new(hex::encode(hasher.clone().finalize()))
    }
}

impl Default for GameIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes game snapshots as JSON records.
struct StoreSaver {
    store: Arc<dyn KeyedStore>,
}

impl GameSaver for StoreSaver {
    fn save_game(&self, hash: &GameHash, entity: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let key = hash.to_string();
        let bytes = serde_json::to_vec_pretty(&entity);
        let store = self.store.clone();
        Box::pin(async move {
            let bytes = bytes.map_err(|source| StorageError::Serialize {
                key: key.clone(),
                source,
            })?;
            store.put(&key, bytes).await
        })
    }
}

/// Game persistence plus the pool of games currently in memory.
pub struct GameStore {
    store: Arc<dyn KeyedStore>,
    ids: GameIdGenerator,
    active: DashMap<GameHash, Arc<Game>>,
    hooks: GameHooks,
}

impl GameStore {
    /// Store games in `store` and broadcast through `fanout`.
    pub fn new(store: Arc<dyn KeyedStore>, ids: GameIdGenerator, fanout: Arc<BroadcastHub>) -> Self {
        let hooks = GameHooks {
            saver: Arc::new(StoreSaver {
                store: store.clone(),
            }),
            fanout,
        };
        Self {
            store,
            ids,
            active: DashMap::new(),
            hooks,
        }
    }

    /// Whether a game with this hash exists, in memory or on disk.
    pub async fn contains(&self, hash: &GameHash) -> StorageResult<bool> {
        if self.active.contains_key(hash) {
            return Ok(true);
        }
        self.store.contains(hash.as_str()).await
    }

    /// Derive a hash no stored game uses yet.
    ///
    /// Two creators racing between this check and their first save may still
    /// collide; the window is the length of one save.
    pub async fn new_game_hash(&self, creator: &str) -> StorageResult<GameHash> {
        let mut hash = self.ids.next_digest(creator.as_bytes());
        let mut round: u8 = 0;
        while self.contains(&hash).await? {
            debug!(game = %hash, "hash already taken; rehashing");
            hash = self.ids.next_digest(&[round]);
            round = round.wrapping_add(1);
        }
        Ok(hash)
    }

    /// Create, save and pool a new game hosted by `host`.
    pub async fn create_game(
        &self,
        host: &str,
        start: &str,
        goal: &str,
        wiki_url: &str,
    ) -> StorageResult<Arc<Game>> {
        let hash = self.new_game_hash(host).await?;
        let game = Arc::new(
            Game::new(host, start, goal, wiki_url).into_persisted(hash.clone(), self.hooks.clone()),
        );
        game.persist().await?;
        self.active.insert(hash.clone(), game.clone());
        info!(game = %hash, host = %host, start = %start, goal = %goal, "game created");
        Ok(game)
    }

    /// Return the pooled instance for `hash`, loading it from storage if needed.
    ///
    /// Concurrent loads of the same hash all end up with the same instance. A
    /// hash the store cannot use as a key names no game and is reported as
    /// [`StorageError::NotFound`].
    pub async fn get_game_by_hash(&self, hash: &GameHash) -> StorageResult<Arc<Game>> {
        if let Some(game) = self.active.get(hash) {
            return Ok(game.value().clone());
        }

        let bytes = self.store.get(hash.as_str()).await.map_err(|err| match err {
            StorageError::InvalidKey { key } => StorageError::NotFound { key },
            other => other,
        })?;
        let entity: GameEntity =
            serde_json::from_slice(&bytes).map_err(|source| StorageError::Deserialize {
                key: hash.to_string(),
                source,
            })?;

        // Only the store knows the real hash, so the loaded game takes it from here.
        let identity = GameIdentity::Persisted {
            hash: hash.clone(),
            hooks: self.hooks.clone(),
        };
        let loaded = Arc::new(Game::from_entity(entity, identity));

        let game = match self.active.entry(hash.clone()) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                debug!(game = %hash, "game loaded into active pool");
                slot.insert(loaded).value().clone()
            }
        };
        Ok(game)
    }

    /// Persist `game` explicitly.
    pub async fn save(&self, game: &Game) -> StorageResult<()> {
        game.persist().await
    }

    /// Number of games currently pooled in memory.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Underlying keyed store.
    pub fn keyed_store(&self) -> &Arc<dyn KeyedStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::dao::keyed_store::{FsKeyedStore, MemoryKeyedStore};

    fn game_store(store: Arc<MemoryKeyedStore>) -> GameStore {
        let fanout = Arc::new(BroadcastHub::new(store.clone(), 4));
        GameStore::new(store, GameIdGenerator::with_seed(b"fixed"), fanout)
    }

    #[test]
    fn digests_change_on_every_call() {
        let ids = GameIdGenerator::with_seed(b"seed");
        let first = ids.next_digest(b"ada");
        let second = ids.next_digest(b"ada");
        assert_ne!(first, second);
        assert_eq!(first.as_str().len(), 64);
    }

    #[tokio::test]
    async fn new_hash_skips_existing_records() {
        let store = Arc::new(MemoryKeyedStore::new());
        let predicted = GameIdGenerator::with_seed(b"fixed").next_digest(b"ada");
        store.put(predicted.as_str(), b"{}".to_vec()).await.unwrap();

        let games = game_store(store.clone());
        let hash = games.new_game_hash("ada").await.unwrap();
        assert_ne!(hash, predicted);
        assert!(!store.contains(hash.as_str()).await.unwrap());
    }

    #[tokio::test]
    async fn created_game_is_saved_and_pooled() {
        let store = Arc::new(MemoryKeyedStore::new());
        let games = game_store(store.clone());

        let game = games
            .create_game("ada", "Rust", "Iron", "https://en.wikipedia.org")
            .await
            .unwrap();
        let hash = game.hash().unwrap().clone();

        let stored: GameEntity = serde_json::from_slice(&store.get(hash.as_str()).await.unwrap()).unwrap();
        assert_eq!(stored.host, "ada");
        assert_eq!(stored.players[0].name, "ada");
        assert_eq!(stored.goal, "Iron");

        let pooled = games.get_game_by_hash(&hash).await.unwrap();
        assert!(Arc::ptr_eq(&game, &pooled));
    }

    #[tokio::test]
    async fn loads_from_storage_once() {
        let store = Arc::new(MemoryKeyedStore::new());
        let hash = {
            let games = game_store(store.clone());
            let game = games.create_game("ada", "Rust", "Iron", "").await.unwrap();
            game.add_player("bob").await.unwrap();
            game.hash().unwrap().clone()
        };

        let games = game_store(store);
        let first = games.get_game_by_hash(&hash).await.unwrap();
        let second = games.get_game_by_hash(&hash).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.hash(), Some(&hash));
        assert!(first.has_player("bob").await);
        assert_eq!(games.active_count(), 1);
    }

    #[tokio::test]
    async fn missing_game_is_not_found() {
        let games = game_store(Arc::new(MemoryKeyedStore::new()));
        let err = games.get_game_by_hash(&GameHash::new("missing")).await.err().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn unusable_ids_are_not_found_on_disk() {
        let dir = std::env::temp_dir().join(format!("wikirace-games-{}", uuid::Uuid::new_v4()));
        let store = Arc::new(FsKeyedStore::open(&dir).await.unwrap());
        let fanout = Arc::new(BroadcastHub::new(store.clone(), 4));
        let games = GameStore::new(store, GameIdGenerator::with_seed(b"fixed"), fanout);

        for id in ["no such", "../etc", "a/b", ""] {
            let err = games.get_game_by_hash(&GameHash::new(id)).await.err().unwrap();
            assert!(err.is_not_found(), "{id:?}: {err:?}");
        }
        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn corrupt_record_is_reported() {
        let store = Arc::new(MemoryKeyedStore::new());
        store.put("broken", b"not json".to_vec()).await.unwrap();
        let games = game_store(store);
        let err = games.get_game_by_hash(&GameHash::new("broken")).await.err().unwrap();
        assert!(matches!(err, StorageError::Deserialize { .. }));
    }
}
