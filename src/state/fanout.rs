use std::{fmt, sync::Arc};

use dashmap::DashMap;
use indexmap::IndexMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{keyed_store::KeyedStore, models::GameHash},
    dto::ws::GameMessage,
};

/// Identity of one realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Handle used to push messages into one connection's mailbox.
#[derive(Clone)]
pub struct Registration {
    /// Player the connection belongs to; messages are addressed to them.
    pub player_name: String,
    /// Sending half of the connection's mailbox.
    pub tx: mpsc::Sender<GameMessage>,
}

/// Routes game events to every realtime connection registered for that game.
pub struct BroadcastHub {
    store: Arc<dyn KeyedStore>,
    games: DashMap<GameHash, IndexMap<ConnectionId, Registration>>,
    mailbox_capacity: usize,
}

impl BroadcastHub {
    /// Build a hub whose mailboxes hold `mailbox_capacity` messages (at least one).
    pub fn new(store: Arc<dyn KeyedStore>, mailbox_capacity: usize) -> Self {
        Self {
            store,
            games: DashMap::new(),
            mailbox_capacity: mailbox_capacity.max(1),
        }
    }

    /// Create the bounded mailbox a connection's delivery loop drains.
    pub fn mailbox(&self) -> (mpsc::Sender<GameMessage>, mpsc::Receiver<GameMessage>) {
        mpsc::channel(self.mailbox_capacity)
    }

    /// Attach a connection to a game. Re-registering the same id replaces it.
    ///
    /// Returns `false` without registering when the game is not in the store.
    pub async fn register(&self, game: &GameHash, id: ConnectionId, registration: Registration) -> bool {
        match self.store.contains(game.as_str()).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(game = %game, connection = %id, "refusing registration for unknown game");
                return false;
            }
            Err(err) => {
                warn!(game = %game, connection = %id, error = %err, "store lookup failed; refusing registration");
                return false;
            }
        }

        info!(game = %game, connection = %id, player = %registration.player_name, "realtime client registered");
        self.games
            .entry(game.clone())
            .or_default()
            .insert(id, registration);
        true
    }

    /// Detach a connection. Missing games or connections are ignored.
    pub fn unregister(&self, game: &GameHash, id: ConnectionId) {
        let removed = self
            .games
            .get_mut(game)
            .and_then(|mut connections| connections.shift_remove(&id));
        if removed.is_some() {
            debug!(game = %game, connection = %id, "realtime client unregistered");
        }
        self.games
            .remove_if(game, |_, connections| connections.is_empty());
    }

    /// Number of connections registered for `game`.
    pub fn connection_count(&self, game: &GameHash) -> usize {
        self.games.get(game).map_or(0, |connections| connections.len())
    }

    /// Deliver `message` to every connection of `game`, addressed to its player.
    ///
    /// Works on a snapshot of the registrations. A full mailbox makes this wait
    /// for space; a closed one drops that connection and delivery continues.
    pub async fn broadcast(&self, game: &GameHash, message: GameMessage) {
        let recipients: Vec<(ConnectionId, Registration)> = match self.games.get(game) {
            Some(connections) => connections
                .iter()
                .map(|(id, registration)| (*id, registration.clone()))
                .collect(),
            None => return,
        };

        for (id, registration) in recipients {
            let addressed = message.addressed_to(&registration.player_name);
            if registration.tx.send(addressed).await.is_err() {
                warn!(game = %game, connection = %id, "mailbox closed, dropping realtime client");
                self.unregister(game, id);
            }
        }
    }
}
