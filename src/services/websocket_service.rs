use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt, stream::SplitSink};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dao::models::GameHash,
    dto::ws::GameMessage,
    services::{game_service::load_game, session::Session},
    state::{
        SharedState,
        fanout::{BroadcastHub, ConnectionId, Registration},
    },
};

/// Handle the full lifecycle of one player's realtime connection.
///
/// The session has already been verified by the upgrade handler. The client
/// only listens; inbound text is ignored.
pub async fn handle_socket(state: SharedState, session: Session, socket: WebSocket) {
    let Session {
        player_name,
        game_hash,
    } = session;
    let (mut sender, mut receiver) = socket.split();

    let game = match load_game(&state, &game_hash).await {
        Ok(game) => game,
        Err(err) => {
            warn!(game = %game_hash, player = %player_name, error = %err, "realtime client for unavailable game");
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };
    let Some(player) = game.player(&player_name).await else {
        warn!(game = %game_hash, player = %player_name, "realtime client is not part of the game");
        let _ = sender.send(Message::Close(None)).await;
        return;
    };

    let fanout = state.fanout().clone();
    let connection = ConnectionId::new();
    let (mailbox_tx, mailbox_rx) = fanout.mailbox();
    let registration = Registration {
        player_name: player_name.clone(),
        tx: mailbox_tx,
    };
    if !fanout.register(&game_hash, connection, registration).await {
        let _ = sender.send(Message::Close(None)).await;
        return;
    }

    let (control_tx, control_rx) = mpsc::unbounded_channel::<Message>();
    // Dedicated writer task drains the mailbox while we await inbound frames.
    let writer_task = tokio::spawn(run_writer(
        sender,
        mailbox_rx,
        control_rx,
        fanout.clone(),
        game_hash.clone(),
        connection,
    ));

    // Sent from a separate task: this connection's own writer must already be draining.
    {
        let game = game.clone();
        tokio::spawn(async move { game.broadcast(GameMessage::join(&player)).await });
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(game = %game_hash, player = %player_name, payload = %text, "ignoring client message");
            }
            Ok(Message::Ping(payload)) => {
                let _ = control_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(game = %game_hash, player = %player_name, "realtime client closed");
                let _ = control_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(game = %game_hash, player = %player_name, error = %err, "websocket error");
                break;
            }
        }
    }

    fanout.unregister(&game_hash, connection);
    info!(
        game = %game_hash,
        player = %player_name,
        connection = %connection,
        remaining = fanout.connection_count(&game_hash),
        "realtime client disconnected"
    );
    finalize(writer_task, control_tx).await;
}

/// Forward mailbox messages and control frames to the socket until either side closes.
///
/// A failed send drops the registration so broadcasts stop waiting on this mailbox.
async fn run_writer(
    mut sender: SplitSink<WebSocket, Message>,
    mut mailbox: mpsc::Receiver<GameMessage>,
    mut control: mpsc::UnboundedReceiver<Message>,
    fanout: Arc<BroadcastHub>,
    game: GameHash,
    connection: ConnectionId,
) {
    loop {
        let frame = tokio::select! {
            message = mailbox.recv() => match message {
                Some(message) => match serde_json::to_string(&message) {
                    Ok(payload) => Message::Text(payload.into()),
                    Err(err) => {
                        warn!(game = %game, error = %err, "failed to serialize game message `{message:?}`");
                        continue;
                    }
                },
                None => break,
            },
            frame = control.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        if sender.send(frame).await.is_err() {
            warn!(game = %game, connection = %connection, "send failed, dropping realtime client");
            fanout.unregister(&game, connection);
            break;
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, control_tx: mpsc::UnboundedSender<Message>) {
    drop(control_tx);
    let _ = writer_task.await;
}
