/// Per-game registry of realtime connections.
pub mod fanout;
/// Game and player state machine.
pub mod game;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    dao::{
        game_store::{GameIdGenerator, GameStore},
        keyed_store::KeyedStore,
    },
    services::{
        page_token::{PAGE_KEY_LENGTH, PageTokenCodec},
        session::SessionKeys,
    },
};

use self::fanout::BroadcastHub;

/// Handle to the application state cloned into every handler.
pub type SharedState = Arc<AppState>;

/// Central application state shared by every handler.
pub struct AppState {
    config: Arc<AppConfig>,
    games: GameStore,
    fanout: Arc<BroadcastHub>,
    page_tokens: PageTokenCodec,
    sessions: SessionKeys,
}

impl AppState {
    /// Wire the game store, fanout and codecs around `store`.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn KeyedStore>,
        page_key: &[u8; PAGE_KEY_LENGTH],
        sessions: SessionKeys,
    ) -> SharedState {
        let fanout = Arc::new(BroadcastHub::new(store.clone(), config.mailbox_capacity()));
        let games = GameStore::new(store, GameIdGenerator::new(), fanout.clone());
        Arc::new(Self {
            config: Arc::new(config),
            games,
            fanout,
            page_tokens: PageTokenCodec::new(page_key),
            sessions,
        })
    }

    /// Application configuration loaded at startup.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Pool and persistence of games.
    pub fn games(&self) -> &GameStore {
        &self.games
    }

    /// Realtime connections per game.
    pub fn fanout(&self) -> &Arc<BroadcastHub> {
        &self.fanout
    }

    /// Codec for the page tokens in visit links.
    pub fn page_tokens(&self) -> &PageTokenCodec {
        &self.page_tokens
    }

    /// Signing keys for session cookies.
    pub fn sessions(&self) -> &SessionKeys {
        &self.sessions
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    use crate::dao::keyed_store::MemoryKeyedStore;

    const TEST_KEY: &[u8; PAGE_KEY_LENGTH] = b"0123456789abcdef";

    /// In-memory state with default configuration.
    pub fn memory_state() -> SharedState {
        let sessions = SessionKeys::derive(TEST_KEY).unwrap();
        AppState::new(
            AppConfig::default(),
            Arc::new(MemoryKeyedStore::new()),
            TEST_KEY,
            sessions,
        )
    }
}
